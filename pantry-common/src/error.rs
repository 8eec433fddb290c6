// Copyright 2026 pantry Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    backtrace::Backtrace,
    fmt::{Debug, Display},
    sync::Arc,
};

use itertools::Itertools;

/// ErrorKind is all kinds of Error of pantry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An entry processor raised an error while transforming an entry.
    EntryProcessing,
    /// A user supplied customization failed to initialize or to release its resources.
    Customization,
    /// The cache or a collaborator was used in a way it does not permit.
    Usage,
    /// External error.
    External,
    /// Config error.
    Config,
    /// Channel closed.
    ChannelClosed,
    /// Closed.
    Closed,
    /// Unsupported operation.
    Unsupported,
    /// Multiple errors collected from one step.
    Multiple,
}

impl ErrorKind {
    /// Convert self into static str.
    pub fn into_static(self) -> &'static str {
        self.into()
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

impl From<ErrorKind> for &'static str {
    fn from(v: ErrorKind) -> &'static str {
        match v {
            ErrorKind::EntryProcessing => "Entry processing error",
            ErrorKind::Customization => "Customization error",
            ErrorKind::Usage => "Usage error",
            ErrorKind::External => "External error",
            ErrorKind::Config => "Config error",
            ErrorKind::ChannelClosed => "Channel closed",
            ErrorKind::Closed => "Closed",
            ErrorKind::Unsupported => "Unsupported operation",
            ErrorKind::Multiple => "Multiple errors",
        }
    }
}

/// Error is the error struct returned by all pantry functions.
///
/// ## Display
///
/// - Via `Display`, the error is printed in a single line:
///
/// ```shell
/// Customization error, context: { name: loader } => initialization of customization failed, source: boom
/// ```
///
/// - Via `Debug`, the error is printed in multiple lines with context, source and backtrace (if captured).
///
/// - Via `{:#?}`, the conventional struct-style representation is printed.
pub struct Error {
    kind: ErrorKind,
    message: String,

    context: Vec<(&'static str, String)>,

    source: Option<Arc<anyhow::Error>>,
    backtrace: Option<Arc<Backtrace>>,
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // If alternate has been specified, we will print like Debug.
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("context", &self.context);
            de.field("source", &self.source);
            de.field("backtrace", &self.backtrace);
            return de.finish();
        }

        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        writeln!(f)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "  {}: {}", k, v)?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "Source:")?;
            writeln!(f, "  {source:#}")?;
        }

        if let Some(backtrace) = &self.backtrace {
            writeln!(f)?;
            writeln!(f, "Backtrace:")?;
            writeln!(f, "{backtrace}")?;
        }

        Ok(())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;

        if !self.context.is_empty() {
            write!(
                f,
                ", context: {{ {} }}",
                self.context.iter().map(|(k, v)| format!("{k}: {v}")).join(", ")
            )?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref().as_ref())
    }
}

/// Cloning an [`Error`] shares its source and backtrace.
impl Clone for Error {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            context: self.context.clone(),
            source: self.source.clone(),
            backtrace: self.backtrace.clone(),
        }
    }
}

impl Error {
    /// Create a new error.
    ///
    /// If the error needs to carry a source error, please use `with_source` method.
    ///
    /// ```rust
    /// # use pantry_common::error::{Error, ErrorKind};
    /// let cause = std::io::Error::other("disk on fire");
    /// Error::new(ErrorKind::Customization, "initialization of customization failed").with_source(cause);
    /// ```
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::new(),
            source: None,
            backtrace: Some(Arc::new(Backtrace::capture())),
        }
    }

    /// Add more context in error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Set source for error.
    ///
    /// # Notes
    ///
    /// If the source has been set, we will raise a panic here.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "the source error has been set");
        self.source = Some(Arc::new(source.into()));
        self
    }

    /// Set a source that is shared with other errors, e.g. a cause unwrapped from another error.
    pub fn with_shared_source(mut self, source: Arc<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "the source error has been set");
        self.source = Some(source);
        self
    }

    /// Re-capture the backtrace at the current call site.
    ///
    /// The kind, message, context and source are untouched, so the cause chain survives while the trace reflects
    /// the caller that re-raises the error.
    pub fn refresh_backtrace(mut self) -> Self {
        self.backtrace = Some(Arc::new(Backtrace::capture()));
        self
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the error context.
    pub fn context(&self) -> &Vec<(&'static str, String)> {
        &self.context
    }

    /// Get the value of the first context entry with the given key.
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    /// Get the error backtrace.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_deref()
    }

    /// Get the error source.
    pub fn source(&self) -> Option<&anyhow::Error> {
        self.source.as_deref()
    }

    /// Get the shared handle of the error source.
    pub fn shared_source(&self) -> Option<&Arc<anyhow::Error>> {
        self.source.as_ref()
    }

    /// Downcast the reference of the source error to a specific error type reference.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source.as_deref().and_then(|e| e.downcast_ref::<E>())
    }
}

/// Result type for pantry.
pub type Result<T> = std::result::Result<T, Error>;

/// A list of errors collected from one step that keeps going after a failure.
#[derive(Debug, thiserror::Error)]
pub struct MultipleError(Vec<Error>);

impl Display for MultipleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "multiple errors: [{}]", self.0.iter().join(", "))
    }
}

impl MultipleError {
    /// The collected errors, in the order they were raised.
    pub fn errors(&self) -> &[Error] {
        &self.0
    }
}

/// Helper methods for Error.
impl Error {
    /// Combine errors collected from one step.
    ///
    /// A single error is returned as is.
    pub fn multiple(mut errs: Vec<Error>) -> Self {
        if errs.len() == 1 {
            if let Some(err) = errs.pop() {
                return err;
            }
        }
        let count = errs.len();
        Error::new(ErrorKind::Multiple, "").with_context("count", count).with_source(MultipleError(errs))
    }

    /// Get the errors combined by [`Error::multiple`], if this is such an error.
    pub fn errors(&self) -> Option<&[Error]> {
        self.downcast_ref::<MultipleError>().map(|e| e.errors())
    }

    /// Helper for creating an [`ErrorKind::Closed`] error for the named cache.
    pub fn closed(qualifier: impl ToString) -> Self {
        Error::new(ErrorKind::Closed, "cache is closed").with_context("cache", qualifier)
    }

    /// Helper for creating an [`ErrorKind::Unsupported`] error.
    pub fn unsupported(operation: &'static str) -> Self {
        Error::new(ErrorKind::Unsupported, "operation is not supported").with_context("operation", operation)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<Error>();
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestError(String);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "TestError: {}", self.0)
        }
    }

    impl std::error::Error for TestError {}

    #[test]
    fn test_error_display() {
        let err = Error::new(ErrorKind::Customization, "initialization of customization failed")
            .with_source(TestError("boom".to_string()))
            .with_context("k1", "v1")
            .with_context("k2", "v2");

        assert_eq!(
            "Customization error, context: { k1: v1, k2: v2 } => initialization of customization failed, source: TestError: boom",
            err.to_string()
        );
    }

    #[test]
    fn test_error_downcast() {
        let inner = TestError("Error or not error, that is a question.".to_string());
        let err = Error::new(ErrorKind::External, "").with_source(inner.clone());

        let downcasted = err.downcast_ref::<TestError>().unwrap();
        assert_eq!(downcasted, &inner);
    }

    #[test]
    fn test_refresh_backtrace_keeps_cause() {
        let err = Error::new(ErrorKind::EntryProcessing, "entry processor failed")
            .with_context("key", "a")
            .with_source(TestError("boom".to_string()));
        let source = err.shared_source().cloned().unwrap();

        let refreshed = err.refresh_backtrace();
        assert_eq!(refreshed.kind(), ErrorKind::EntryProcessing);
        assert_eq!(refreshed.context_value("key"), Some("a"));
        assert!(Arc::ptr_eq(refreshed.shared_source().unwrap(), &source));
        assert!(refreshed.backtrace().is_some());
    }

    #[test]
    fn test_multiple() {
        let single = Error::multiple(vec![Error::unsupported("remove")]);
        assert_eq!(single.kind(), ErrorKind::Unsupported);
        assert!(single.errors().is_none());

        let err = Error::multiple(vec![Error::unsupported("remove"), Error::closed("'orders'")]);
        assert_eq!(err.kind(), ErrorKind::Multiple);
        assert_eq!(err.context_value("count"), Some("2"));
        let errs = err.errors().unwrap();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].kind(), ErrorKind::Unsupported);
        assert_eq!(errs[1].kind(), ErrorKind::Closed);
        assert!(err.to_string().starts_with("Multiple errors, context: { count: 2 }, source: multiple errors: ["));
    }
}
