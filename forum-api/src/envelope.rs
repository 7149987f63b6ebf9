pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Shape of every successful response of the content API
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub meta: Meta,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Envelope<T> {
        Envelope {
            data,
            meta: Meta::default(),
        }
    }

    pub fn paginated(data: T, pagination: Pagination) -> Envelope<T> {
        Envelope {
            data,
            meta: Meta {
                pagination: Some(pagination),
            },
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
    #[serde(default)]
    pub page_count: u64,
    pub total: u64,
}

impl Default for Pagination {
    fn default() -> Pagination {
        Pagination {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            page_count: 0,
            total: 0,
        }
    }
}

impl Pagination {
    pub fn for_total(page: u64, page_size: u64, total: u64) -> Pagination {
        let page_count = match page_size {
            0 => 0,
            s => total.div_ceil(s),
        };
        Pagination {
            page,
            page_size,
            page_count,
            total,
        }
    }

    /// Index range of the items on this page, clamped to `total`
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.page.saturating_sub(1).saturating_mul(self.page_size);
        let end = start.saturating_add(self.page_size).min(self.total);
        (start.min(self.total) as usize)..(end as usize)
    }
}

/// Body of every write request: the record's attributes wrapped in `data`
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Payload<T> {
    pub data: T,
}
