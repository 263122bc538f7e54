use std::fmt;

/// Pipeline stage a failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Clean,
    Partition,
    Train,
    Evaluate,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Clean => "clean",
            Stage::Partition => "partition",
            Stage::Train => "train",
            Stage::Evaluate => "evaluate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A component error tagged with the stage that raised it.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl StageError {
    pub fn new(
        stage: Stage,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Attach a [`Stage`] to any error result.
pub trait StageContext<T> {
    fn in_stage(self, stage: Stage) -> Result<T, StageError>;
}

impl<T, E> StageContext<T> for Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    fn in_stage(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|e| StageError::new(stage, e))
    }
}
