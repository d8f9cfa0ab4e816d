pub mod balance;
pub mod base;
pub mod cashflow;
pub mod fund_holdings;
pub mod fundamental;

pub use balance::BalanceQuery;
pub use base::QueryContext;
pub use cashflow::CashFlowQuery;
pub use fund_holdings::FundHoldingsQuery;
pub use fundamental::FundamentalQuery;
