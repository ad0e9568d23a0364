use ulid::Ulid;

/// What a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Staff,
    Service,
    Appointment,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Staff => "staff",
            Entity::Service => "service",
            Entity::Appointment => "appointment",
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    /// Missing or malformed required input. Always caller-visible.
    Validation(&'static str),
    NotFound(Entity, Ulid),
    AlreadyExists(Ulid),
    /// The requested staff already has an active booking in the window.
    /// Carries the conflicting appointment id.
    Conflict(Ulid),
    LimitExceeded(&'static str),
    /// Durability failure. Logged with detail, surfaced generically.
    Wal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "validation: {msg}"),
            EngineError::NotFound(entity, id) => {
                write!(f, "{} not found: {id}", entity.as_str())
            }
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(id) => {
                write!(f, "staff already has an appointment at this time (conflicts with {id})")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
