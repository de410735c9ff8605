use chrono::{DateTime, SubsecRound, Utc};

/// Wire format for `updated_at_after`: UTC, second precision, explicit `Z`.
pub const WATERMARK_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Pagination relies on every request using this order.
const SORT_FIELD: &str = "updated_at";
const SORT_DIRECTION: &str = "ASC";

pub fn format_watermark(ts: DateTime<Utc>) -> String {
    ts.trunc_subsecs(0).format(WATERMARK_FORMAT).to_string()
}

/// Parse an RFC 3339 timestamp with any offset and normalize it to UTC.
pub fn parse_watermark(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value.trim()).map(|dt| dt.with_timezone(&Utc))
}

/// Fixed parameters of one fetch; only `page` varies between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueQuery {
    pub place_url: String,
    pub per_page: u32,
    pub details: bool,
    /// Lower bound on `updated_at`; `None` fetches the whole catalog.
    pub updated_after: Option<DateTime<Utc>>,
}

impl IssueQuery {
    pub fn params(&self, page: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", page.to_string()),
            ("per_page", self.per_page.to_string()),
            ("details", self.details.to_string()),
            ("sort_direction", SORT_DIRECTION.to_string()),
            ("sort", SORT_FIELD.to_string()),
            ("place_url", self.place_url.clone()),
        ];
        if let Some(after) = self.updated_after {
            params.push(("updated_at_after", format_watermark(after)));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn query(updated_after: Option<DateTime<Utc>>) -> IssueQuery {
        IssueQuery {
            place_url: "tacoma".to_string(),
            per_page: 10,
            details: true,
            updated_after,
        }
    }

    #[test]
    fn watermark_is_utc_with_z() {
        let ts = Utc.with_ymd_and_hms(2024, 11, 15, 0, 0, 0).unwrap();
        assert_eq!(format_watermark(ts), "2024-11-15T00:00:00Z");
    }

    #[test]
    fn watermark_drops_subseconds() {
        let ts = Utc.with_ymd_and_hms(2024, 11, 20, 8, 30, 5).unwrap()
            + chrono::Duration::milliseconds(987);
        assert_eq!(format_watermark(ts), "2024-11-20T08:30:05Z");
    }

    #[test]
    fn parse_normalizes_offset_to_utc() {
        let ts = parse_watermark("2024-11-20T14:03:11-05:00").unwrap();
        assert_eq!(format_watermark(ts), "2024-11-20T19:03:11Z");
    }

    #[test]
    fn parse_rejects_naive_timestamp() {
        assert!(parse_watermark("2024-11-20 14:03:11").is_err());
    }

    #[test]
    fn first_run_params_have_no_lower_bound() {
        let params = query(None).params(1);
        assert_eq!(
            params,
            vec![
                ("page", "1".to_string()),
                ("per_page", "10".to_string()),
                ("details", "true".to_string()),
                ("sort_direction", "ASC".to_string()),
                ("sort", "updated_at".to_string()),
                ("place_url", "tacoma".to_string()),
            ]
        );
    }

    #[test]
    fn incremental_params_carry_watermark() {
        let after = Utc.with_ymd_and_hms(2024, 12, 1, 6, 45, 0).unwrap();
        let params = query(Some(after)).params(4);
        assert_eq!(params[0], ("page", "4".to_string()));
        assert_eq!(
            params.last(),
            Some(&("updated_at_after", "2024-12-01T06:45:00Z".to_string()))
        );
    }
}
