pub mod branding;
pub mod cart;
pub mod categories;
pub mod checkout;
pub mod orders;
pub mod products;
pub mod users;

pub use branding::BrandingService;
pub use cart::CartService;
pub use categories::CategoryService;
pub use checkout::CheckoutService;
pub use orders::OrderService;
pub use products::ProductService;
pub use users::UserService;

/// Converts a 1-based page number into the 0-based index the paginator expects.
pub(crate) fn page_index(page: u64) -> u64 {
    page.max(1) - 1
}
