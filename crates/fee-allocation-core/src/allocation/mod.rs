pub mod allocator;
pub mod installment;
pub mod request;
pub mod validation;
