//! The interceptor chain commands travel through.
//!
//! Interceptors are held in a fixed order; each one receives the command
//! plus the rest of the chain and either answers itself, delegates onward,
//! or fails. The rest-of-chain handle makes the delegation explicit
//! continuation passing rather than virtual-call chaining.

use std::fmt::Debug;
use std::sync::Arc;

use crate::content::command::{Command, CommandOutput, InvocationContext};
use crate::error::{Result, XiphosError};

/// One element of the content access pipeline.
pub trait Interceptor: Send + Sync + Debug {
    /// Handle a command, optionally delegating to the rest of the chain.
    fn invoke(
        &self,
        context: &InvocationContext,
        command: &Command,
        next: NextInterceptor<'_>,
    ) -> Result<CommandOutput>;
}

/// Handle on the not-yet-run tail of the chain.
#[derive(Debug)]
pub struct NextInterceptor<'a> {
    chain: &'a [Arc<dyn Interceptor>],
}

impl NextInterceptor<'_> {
    /// Delegate the command to the next interceptor.
    ///
    /// Fails when the chain is exhausted; the terminal interceptor must
    /// answer every command that reaches it.
    pub fn proceed(
        self,
        context: &InvocationContext,
        command: &Command,
    ) -> Result<CommandOutput> {
        match self.chain.split_first() {
            Some((head, rest)) => head.invoke(context, command, NextInterceptor { chain: rest }),
            None => Err(XiphosError::execution(
                "command fell off the end of the interceptor chain",
            )),
        }
    }
}

/// The fixed, ordered interceptor chain.
#[derive(Debug, Clone)]
pub struct ContentPipeline {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ContentPipeline {
    /// Create a pipeline from an ordered interceptor list; the last element
    /// is the terminal interceptor.
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        ContentPipeline { interceptors }
    }

    /// Execute a command through the chain.
    pub fn execute(
        &self,
        context: &InvocationContext,
        command: &Command,
    ) -> Result<CommandOutput> {
        NextInterceptor {
            chain: &self.interceptors,
        }
        .proceed(context, command)
    }
}
