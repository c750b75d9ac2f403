pub mod order;
pub mod screening;
pub mod seat;
pub mod voucher;

pub use order::{AppliedVoucher, FailureReason, LineItem, Order, OrderStatus};
pub use screening::{Screening, ScreeningStatus};
pub use seat::{SeatSlot, SeatStatus, SeatTier};
pub use voucher::{LoyaltyLedgerEntry, Voucher, VoucherRedemption};
