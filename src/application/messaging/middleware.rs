//! Middleware system for the command pipeline
//!
//! Guards run synchronously before a command is routed. The first guard
//! that fails stops the chain.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::parser::ParsedCommand;
use crate::domain::entities::Message;
use crate::infrastructure::security::OwnerRegistry;

/// Context passed through middleware chain
#[derive(Debug, Clone)]
pub struct Context {
    pub message: Message,
    pub command: ParsedCommand,
    pub data: HashMap<String, String>,
}

impl Context {
    pub fn new(message: Message, command: ParsedCommand) -> Self {
        Self {
            message,
            command,
            data: HashMap::new(),
        }
    }

    /// Annotate the context for guards further down the chain
    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }
}

/// Middleware trait - guards that may stop a command before routing
pub trait Middleware: Send + Sync {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult;
}

pub type MiddlewareResult = Result<Context, MiddlewareError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MiddlewareError {
    /// Stop processing and show this text
    #[error("blocked: {0}")]
    Blocked(String),

    #[error("sender over quota, retry in {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Sender is not an owner
    #[error("sender is not an owner")]
    PermissionDenied,

    #[error("guard failure: {0}")]
    Internal(String),
}

/// Remaining middleware in chain
#[derive(Clone)]
pub struct Next {
    remaining: Arc<[Arc<dyn Middleware>]>,
}

impl Next {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            remaining: middlewares.into(),
        }
    }

    pub fn run(self, ctx: Context) -> MiddlewareResult {
        match self.remaining.split_first() {
            Some((first, rest)) => first.process(ctx, Next::new(rest.to_vec())),
            None => Ok(ctx),
        }
    }
}

/// Middleware chain builder
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> Vec<Arc<dyn Middleware>> {
        self.middlewares
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Only owners may run commands
pub struct OwnerGateMiddleware {
    owners: Arc<OwnerRegistry>,
}

impl OwnerGateMiddleware {
    pub fn new(owners: Arc<OwnerRegistry>) -> Self {
        Self { owners }
    }
}

impl Middleware for OwnerGateMiddleware {
    fn process(&self, mut ctx: Context, next: Next) -> MiddlewareResult {
        if !self.owners.is_owner(ctx.message.sender_id) {
            tracing::warn!(
                "Denied {} from non-owner {}",
                ctx.command.key,
                ctx.message.sender_id
            );
            return Err(MiddlewareError::PermissionDenied);
        }
        let sender = ctx.message.sender_id.to_string();
        ctx.annotate("owner", sender);
        next.run(ctx)
    }
}

/// Sliding-window limit per sender
pub struct RateLimitMiddleware {
    requests: std::sync::Mutex<HashMap<i64, Vec<Instant>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimitMiddleware {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            requests: std::sync::Mutex::new(HashMap::new()),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    fn check_rate_limit(&self, key: i64) -> Result<(), MiddlewareError> {
        let mut requests = self
            .requests
            .lock()
            .map_err(|_| MiddlewareError::Internal("Lock poisoned".to_string()))?;

        let now = Instant::now();
        let times = requests.entry(key).or_default();
        times.retain(|&t| now.duration_since(t) < self.window);

        if times.len() >= self.max_requests as usize {
            let retry_after = times
                .first()
                .map(|t| self.window.saturating_sub(now.duration_since(*t)))
                .unwrap_or(self.window);
            return Err(MiddlewareError::RateLimited { retry_after });
        }

        times.push(now);
        Ok(())
    }
}

impl Middleware for RateLimitMiddleware {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        self.check_rate_limit(ctx.message.sender_id)?;
        next.run(ctx)
    }
}

/// Traces every command and where the chain stopped it
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        let chat_id = ctx.message.chat_id;
        tracing::debug!(chat_id, command = %ctx.command.key, args = ?ctx.command.args, "command received");

        let result = next.run(ctx);
        match &result {
            Ok(ctx) => tracing::debug!(chat_id, guards = ?ctx.data, "command admitted"),
            Err(e) => tracing::debug!(chat_id, "command stopped: {}", e),
        }
        result
    }
}
