pub mod align;
pub mod expense_service;
pub mod models;
pub mod normalize;
pub mod prompt;

pub use expense_service::{
    CompletionError, CompletionProvider, CompletionRequest, ExpenseError, ExpenseService,
    ParserSettings,
};
pub use models::{EmailRecord, ExpenseRecord};
pub use normalize::ParseError;
