pub mod comparison;
pub mod negotiation;
pub mod notification;
pub mod purchase_order;
pub mod quote;
pub mod requisition;
pub mod rule;
pub mod step;
pub mod user;
