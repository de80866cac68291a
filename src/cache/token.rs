use std::fmt;

/// Opaque bearer credential issued by the identity service.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
}

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

// never leak the credential into logs
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"***")
            .field("len", &self.value.len())
            .finish()
    }
}
