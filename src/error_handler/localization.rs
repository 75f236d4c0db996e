// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User-facing error messages in English and Arabic.
//!
//! Only these catalogue strings may reach an end user; developer messages
//! and raw bank payloads never do.

use crate::error::{ErrorKind, SamaError};

/// Supported message catalogues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    English,
    Arabic,
}

impl Locale {
    /// `ar`, `ar-SA`, `ar_SA` → Arabic; anything else falls back to English.
    pub fn parse(tag: &str) -> Self {
        let primary = tag
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if primary == "ar" {
            Locale::Arabic
        } else {
            Locale::English
        }
    }
}

/// Catalogue message for `error` in `locale`.
pub fn localize(error: &SamaError, locale: &str) -> &'static str {
    message(error.kind(), Locale::parse(locale))
}

pub fn message(kind: ErrorKind, locale: Locale) -> &'static str {
    match locale {
        Locale::English => english(kind),
        Locale::Arabic => arabic(kind),
    }
}

fn english(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::BadRequest => "The request could not be processed. Please check your details and try again.",
        ErrorKind::Unauthorized => "Your session has expired. Please sign in to your bank again.",
        ErrorKind::Forbidden => "You do not have permission to access this information.",
        ErrorKind::RateLimited => "Too many requests. Please wait a moment and try again.",
        ErrorKind::ServerError => "Your bank is temporarily unavailable. Please try again later.",
        ErrorKind::NetworkTimeout => "The connection to your bank timed out. Please try again.",
        ErrorKind::NetworkError => "Unable to connect to your bank. Please check your internet connection.",
        ErrorKind::UnknownError => "An unexpected error occurred. Please try again.",
        ErrorKind::NotFound => "The requested consent could not be found.",
        ErrorKind::InvalidState => "This action is no longer available for this consent.",
        ErrorKind::CertificatePinning => "A secure connection to your bank could not be verified.",
        ErrorKind::Cancelled => "The bank connection was cancelled.",
    }
}

fn arabic(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::BadRequest => "تعذرت معالجة الطلب. يرجى التحقق من البيانات والمحاولة مرة أخرى.",
        ErrorKind::Unauthorized => "انتهت صلاحية الجلسة. يرجى تسجيل الدخول إلى البنك مرة أخرى.",
        ErrorKind::Forbidden => "ليس لديك صلاحية للوصول إلى هذه المعلومات.",
        ErrorKind::RateLimited => "عدد كبير من الطلبات. يرجى الانتظار قليلاً ثم المحاولة مرة أخرى.",
        ErrorKind::ServerError => "البنك غير متاح مؤقتاً. يرجى المحاولة لاحقاً.",
        ErrorKind::NetworkTimeout => "انتهت مهلة الاتصال بالبنك. يرجى المحاولة مرة أخرى.",
        ErrorKind::NetworkError => "تعذر الاتصال بالبنك. يرجى التحقق من اتصالك بالإنترنت.",
        ErrorKind::UnknownError => "حدث خطأ غير متوقع. يرجى المحاولة مرة أخرى.",
        ErrorKind::NotFound => "تعذر العثور على الموافقة المطلوبة.",
        ErrorKind::InvalidState => "هذا الإجراء لم يعد متاحاً لهذه الموافقة.",
        ErrorKind::CertificatePinning => "تعذر التحقق من أمان الاتصال بالبنك.",
        ErrorKind::Cancelled => "تم إلغاء الاتصال بالبنك.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_tags() {
        assert_eq!(Locale::parse("ar"), Locale::Arabic);
        assert_eq!(Locale::parse("AR-sa"), Locale::Arabic);
        assert_eq!(Locale::parse("ar_SA"), Locale::Arabic);
        assert_eq!(Locale::parse("en-GB"), Locale::English);
        assert_eq!(Locale::parse("fr"), Locale::English);
        assert_eq!(Locale::parse(""), Locale::English);
    }

    #[test]
    fn developer_message_never_leaks() {
        let error = SamaError::ServerError {
            status: 502,
            message: "upstream core-banking node cb-03 refused".into(),
            details: Some("stack trace".into()),
        };
        let en = localize(&error, "en");
        let ar = localize(&error, "ar");
        assert!(!en.contains("cb-03"));
        assert!(!ar.contains("cb-03"));
        assert_ne!(en, ar);
        assert_eq!(error.user_message("de"), en);
    }
}
