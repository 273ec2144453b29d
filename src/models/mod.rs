pub mod expense;
pub mod stats;
pub mod user;

// Re-export only the types we actually use
pub use expense::{
    CarType, Category, CategoryDetails, Expense, ExpenseDraft, ExpenseRow, ExpenseStatus,
    NewExpense, TravelMode,
};
pub use user::{check_login, NewUser, Role, User, UserRow};
