use axum::http::{
    HeaderMap, HeaderValue,
    header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, EXPIRES, PRAGMA},
};
use time::{Date, OffsetDateTime};

const FALLBACK_STEM: &str = "document";

/// Filesystem-safe download name for `title`, dated today (UTC).
pub fn pdf_filename(title: &str) -> String {
    pdf_filename_on(title, OffsetDateTime::now_utc().date())
}

/// Runs of anything outside ASCII letters and digits collapse into a single
/// `_`; the stem is lower-cased, never starts or ends with `_`, and falls back
/// to `document` when nothing survives.
pub fn pdf_filename_on(title: &str, date: Date) -> String {
    let mut stem = String::with_capacity(title.len());
    let mut separator = false;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if separator && !stem.is_empty() {
                stem.push('_');
            }
            separator = false;
            stem.push(ch.to_ascii_lowercase());
        } else {
            separator = true;
        }
    }

    if stem.is_empty() {
        stem.push_str(FALLBACK_STEM);
    }

    format!("{stem}_{date}.pdf")
}

/// Response headers for a PDF download: attachment disposition, no caching.
pub fn pdf_headers(filename: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    headers.insert(CONTENT_DISPOSITION, disposition);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn collapses_runs_and_trims_separators() {
        assert_eq!(
            pdf_filename_on("My Resume!!", date!(2024 - 03 - 09)),
            "my_resume_2024-03-09.pdf"
        );
        assert_eq!(
            pdf_filename_on("  --Q3 / Q4 -- Plan--  ", date!(2024 - 12 - 31)),
            "q3_q4_plan_2024-12-31.pdf"
        );
    }

    #[test]
    fn non_ascii_titles_fall_back() {
        assert_eq!(
            pdf_filename_on("简历", date!(2025 - 01 - 02)),
            "document_2025-01-02.pdf"
        );
        assert_eq!(
            pdf_filename_on("Café menu", date!(2025 - 01 - 02)),
            "caf_menu_2025-01-02.pdf"
        );
    }

    #[test]
    fn todays_filename_has_no_doubled_separators() {
        let name = pdf_filename("__Report__");
        assert!(name.starts_with("report_"));
        assert!(name.ends_with(".pdf"));
        assert!(!name.contains("__"));
    }

    #[test]
    fn headers_disable_caching() {
        let headers = pdf_headers("report_2024-03-09.pdf");
        assert_eq!(
            headers[CONTENT_DISPOSITION],
            "attachment; filename=\"report_2024-03-09.pdf\""
        );
        assert_eq!(headers[CONTENT_TYPE], "application/pdf");
        assert_eq!(headers[CACHE_CONTROL], "no-cache, no-store, must-revalidate");
        assert_eq!(headers[PRAGMA], "no-cache");
        assert_eq!(headers[EXPIRES], "0");
    }
}
