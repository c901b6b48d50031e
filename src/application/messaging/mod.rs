//! Message handling - parse, guard, route

pub mod dispatcher;
pub mod middleware;
pub mod parser;

pub use dispatcher::{CommandDispatcher, Dispatch, DispatchStats, DENIED_TEXT, SLOW_DOWN_TEXT};
pub use middleware::{
    LoggingMiddleware, Middleware, MiddlewareChain, OwnerGateMiddleware, RateLimitMiddleware,
};
pub use parser::{CommandParser, ParsedCommand};
