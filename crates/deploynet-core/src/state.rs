/// Lifecycle of a `ModelExecutionEngine`.
///
/// `Uninitialized -> Built -> Ready -> TornDown`. A failed build stays in
/// `Uninitialized`; a failed inference leaves the state unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Uninitialized,
    Built,
    Ready,
    TornDown,
}

impl EngineState {
    pub fn can_infer(self) -> bool {
        matches!(self, EngineState::Built | EngineState::Ready)
    }
}
