pub mod bootstrap;
pub mod create;
pub mod dispatch;
pub mod drop;
pub mod history;
pub mod list;
