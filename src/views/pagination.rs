//! Client-side pagination shared by the table views

use super::{el, Element};

/// Number of page buttons shown around the current page
const WINDOW: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: usize,
}

impl Pagination {
    pub fn new(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page: per_page.max(1),
            total: 0,
        }
    }

    pub fn total_pages(&self) -> u32 {
        let pages = self.total.div_ceil(self.per_page as usize) as u32;
        pages.max(1)
    }

    /// Update the item count, pulling the current page back into range
    pub fn set_total(&mut self, total: usize) {
        self.total = total;
        self.page = self.page.clamp(1, self.total_pages());
    }

    pub fn go_to(&mut self, page: u32) -> bool {
        let page = page.clamp(1, self.total_pages());
        let changed = page != self.page;
        self.page = page;
        changed
    }

    pub fn next(&mut self) -> bool {
        self.go_to(self.page + 1)
    }

    pub fn prev(&mut self) -> bool {
        self.go_to(self.page.saturating_sub(1))
    }

    /// Index range of the current page within the filtered items
    pub fn bounds(&self) -> std::ops::Range<usize> {
        let start = ((self.page - 1) * self.per_page) as usize;
        let end = (start + self.per_page as usize).min(self.total);
        start.min(end)..end
    }

    /// Page numbers to show as buttons
    pub fn window(&self) -> std::ops::RangeInclusive<u32> {
        let pages = self.total_pages();
        let mut start = self.page.saturating_sub(2).max(1);
        let end = (start + WINDOW - 1).min(pages);
        if end - start < WINDOW - 1 {
            start = end.saturating_sub(WINDOW - 1).max(1);
        }
        start..=end
    }

    /// "Showing x to y of z entries" plus prev/page/next buttons
    pub fn render(&self) -> Element {
        let bounds = self.bounds();
        let first = if self.total == 0 { 0 } else { bounds.start + 1 };
        let window = self.window();
        let pages = self.total_pages();

        let mut buttons = el("div").id("pagination-pages").class("pagination-pages");
        if *window.start() > 1 {
            buttons = buttons.child(page_button(1, false));
            if *window.start() > 2 {
                buttons = buttons.child(el("span").class("pagination-ellipsis").text("..."));
            }
        }
        for page in window.clone() {
            buttons = buttons.child(page_button(page, page == self.page));
        }
        if *window.end() < pages {
            if *window.end() < pages - 1 {
                buttons = buttons.child(el("span").class("pagination-ellipsis").text("..."));
            }
            buttons = buttons.child(page_button(pages, false));
        }

        el("div")
            .id("pagination-container")
            .class("pagination-container")
            .child(el("div").class("pagination-info").text(format!(
                "Showing {} to {} of {} entries",
                first, bounds.end, self.total
            )))
            .child(
                el("div")
                    .class("pagination-controls")
                    .child(
                        el("button")
                            .id("pagination-prev")
                            .class("btn btn-sm btn-outline")
                            .flag("disabled", self.page == 1)
                            .text("Previous"),
                    )
                    .child(buttons)
                    .child(
                        el("button")
                            .id("pagination-next")
                            .class("btn btn-sm btn-outline")
                            .flag("disabled", self.page == pages)
                            .text("Next"),
                    ),
            )
    }
}

fn page_button(page: u32, current: bool) -> Element {
    el("button")
        .id(&format!("page-{}", page))
        .class("btn btn-sm page-number")
        .class(if current { "btn-primary" } else { "btn-outline" })
        .text(page.to_string())
}
