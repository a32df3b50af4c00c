use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u64);

/// Lifecycle of a data layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LayerState {
    /// Created, not yet activated.
    Idle,
    /// Activated, first load not yet applied.
    Loading,
    Loaded,
    /// A refresh cycle is in flight.
    Refreshing,
    Restyling,
    TornDown,
}

impl fmt::Display for LayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerState::Idle => "idle",
            LayerState::Loading => "loading",
            LayerState::Loaded => "loaded",
            LayerState::Refreshing => "refreshing",
            LayerState::Restyling => "restyling",
            LayerState::TornDown => "torn down",
        };
        f.write_str(name)
    }
}

pub trait Layer {
    fn id(&self) -> LayerId;
    /// Key used for option lookups.
    fn key(&self) -> &str;
    fn state(&self) -> LayerState;
}
