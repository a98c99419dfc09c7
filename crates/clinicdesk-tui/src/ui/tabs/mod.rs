//! Screen content for the two protected routes.

pub mod appointments;
pub mod patients;

use clinicdesk_core::models::PageRequest;

/// "Page 2 of 5 · 5 per page · 23 total"
pub fn paging_summary(request: &PageRequest, page_count: u64, total: u64) -> String {
    format!(
        " Page {} of {} · {} per page · {} total ",
        request.page_no + 1,
        page_count.max(1),
        request.page_size,
        total
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_summary() {
        let request = PageRequest::new(1, 5);
        assert_eq!(
            paging_summary(&request, 5, 23),
            " Page 2 of 5 · 5 per page · 23 total "
        );
    }

    #[test]
    fn test_paging_summary_empty_list_shows_one_page() {
        let request = PageRequest::new(0, 10);
        assert!(paging_summary(&request, 0, 0).starts_with(" Page 1 of 1 "));
    }
}
