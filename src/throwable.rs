//! Polymorphic exception payloads.
//!
//! A throwable field carries a class name, a message, and optionally a stack
//! trace. The class name arrives from an untrusted peer, so decode validates
//! it against a closed allow-list before building anything; an unrecognized
//! name fails structurally and no value is ever constructed from it. This is
//! the defense against decode-time instantiation of attacker-chosen types.

use std::fmt;

use crate::error::{Error, Result};

/// Closed set of exception classes a peer may name on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThrowableClass {
    /// `java.lang.Throwable`
    Throwable,
    /// `java.lang.Exception`
    Exception,
    /// `java.lang.RuntimeException`
    RuntimeException,
    /// `java.lang.SecurityException`
    SecurityException,
    /// `java.io.IOException`
    IoException,
    /// `java.io.EOFException`
    EofException,
}

impl ThrowableClass {
    /// Wire name of the class.
    #[must_use]
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::Throwable => "java.lang.Throwable",
            Self::Exception => "java.lang.Exception",
            Self::RuntimeException => "java.lang.RuntimeException",
            Self::SecurityException => "java.lang.SecurityException",
            Self::IoException => "java.io.IOException",
            Self::EofException => "java.io.EOFException",
        }
    }

    /// Validate a wire name against the allow-list.
    ///
    /// Runs before any payload value is built; an unknown name is rejected
    /// here and nothing about it is retained beyond the error message.
    pub fn from_class_name(name: &str) -> Result<Self> {
        match name {
            "java.lang.Throwable" => Ok(Self::Throwable),
            "java.lang.Exception" => Ok(Self::Exception),
            "java.lang.RuntimeException" => Ok(Self::RuntimeException),
            "java.lang.SecurityException" => Ok(Self::SecurityException),
            "java.io.IOException" => Ok(Self::IoException),
            "java.io.EOFException" => Ok(Self::EofException),
            other => Err(Error::DisallowedThrowableClass {
                class: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for ThrowableClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Exception value carried by a throwable field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WireThrowable {
    /// Validated class of the exception.
    pub class: ThrowableClass,
    /// Human-readable message, if any.
    pub message: Option<String>,
    /// Rendered stack trace; only marshalled when the connection negotiated
    /// stack-trace inclusion.
    pub stack_trace: Option<String>,
}

impl WireThrowable {
    /// Create a throwable with a message and no stack trace.
    #[must_use]
    pub fn new(class: ThrowableClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: Some(message.into()),
            stack_trace: None,
        }
    }

    /// Attach a rendered stack trace.
    #[must_use]
    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }
}

impl fmt::Display for WireThrowable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.class),
            None => write!(f, "{}", self.class),
        }
    }
}
