//! The seam between the driver and the upstream API.

use crate::sync::cursor::CursorValue;
use crate::sync::types::PageResult;

/// A paginated source of raw records.
///
/// Implementations classify every outcome into a `PageResult`; the
/// driver never sees a transport error type. `page_size` is a cap the
/// source may ignore when the endpoint does not take one.
pub trait PageSource {
    fn fetch_page(
        &self,
        cursor: &CursorValue,
        page_size: usize,
    ) -> impl std::future::Future<Output = PageResult> + Send;
}
