pub mod branding;
pub mod cart;
pub mod category;
pub mod order;
pub mod product;
pub mod user;
