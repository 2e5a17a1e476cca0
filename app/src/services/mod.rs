pub mod batch;
pub mod contracts;
pub mod receipts;

// helper section
pub mod export;
pub mod normalize;
pub mod source;
