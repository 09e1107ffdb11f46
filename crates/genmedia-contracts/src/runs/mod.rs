pub mod receipts;
