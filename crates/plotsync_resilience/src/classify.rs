//! Central error classification.

/// How a remote-call failure should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The payload is invalid; retrying cannot help.
    Validation,
    /// Network reset, timeout or a 5xx-equivalent; worth retrying.
    Transient,
    /// Anything else that will fail the same way again.
    Permanent,
}

impl ErrorClass {
    /// Returns true if the retry loop may try again.
    pub fn is_retryable(self) -> bool {
        self == ErrorClass::Transient
    }

    /// Classifies a numeric wire error code.
    pub fn from_code(code: i32) -> Self {
        match code {
            400 => ErrorClass::Validation,
            500..=599 => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        }
    }
}

/// Errors that know their own class.
pub trait Classify {
    /// Returns the class of this error.
    fn class(&self) -> ErrorClass;
}

impl<E: Classify + ?Sized> Classify for Box<E> {
    fn class(&self) -> ErrorClass {
        (**self).class()
    }
}
