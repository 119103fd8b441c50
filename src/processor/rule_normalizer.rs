use anyhow::Result;
use polars::prelude::*;
use std::str::FromStr;

use crate::models::{RecordError, Sku};

/// Text and number normalization shared by the loaders, the SQL emitter and the
/// image resolver.
pub struct RuleNormalizer;

impl RuleNormalizer {
    /// Trims every string column in place so the row readers see clean values.
    pub fn normalize_dataframe(&self, df: &mut DataFrame) -> Result<()> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.as_str().to_string())
            .collect();

        for name in names {
            self.normalize_string_column(df, &name)?;
        }

        Ok(())
    }

    fn normalize_string_column(&self, df: &mut DataFrame, col_name: &str) -> Result<()> {
        let Ok(series) = df.column(col_name).cloned() else {
            return Ok(());
        };
        let Ok(values) = series.str() else {
            return Ok(());
        };

        let normalized: Vec<Option<String>> = values
            .into_iter()
            .map(|value| value.map(|s| s.trim().to_string()))
            .collect();

        df.with_column(Series::new(col_name.into(), normalized))?;
        Ok(())
    }

    /// Parses a VND price such as `750,000`, `750.000 ₫` or `1250000`.
    pub fn parse_price(&self, raw: &str) -> Result<f64, RecordError> {
        let stripped: String = raw
            .replace("VND", "")
            .replace("vnd", "")
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '₫' | 'đ' | 'Đ' | ','))
            .collect();

        if stripped.is_empty() {
            return Err(RecordError::InvalidPrice(raw.trim().to_string()));
        }

        let numeric = if is_dot_grouped(&stripped) {
            stripped.replace('.', "")
        } else {
            stripped
        };

        match f64::from_str(&numeric) {
            Ok(price) if price.is_finite() && price >= 0.0 => Ok(price),
            _ => Err(RecordError::InvalidPrice(raw.trim().to_string())),
        }
    }

    /// Replaces Vietnamese letters with their base ASCII letter, keeping case.
    pub fn transliterate(&self, text: &str) -> String {
        text.chars()
            .filter(|c| !is_combining_mark(*c))
            .map(|c| {
                let lower = c.to_lowercase().next().unwrap_or(c);
                let base = fold_vietnamese(lower);
                if c.is_uppercase() {
                    base.to_ascii_uppercase()
                } else {
                    base
                }
            })
            .collect()
    }

    pub fn slugify(&self, text: &str) -> String {
        let ascii = self.transliterate(&text.to_lowercase());
        let mut slug = String::with_capacity(ascii.len());

        for c in ascii.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if (c.is_whitespace() || c == '-') && !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }

        slug.trim_end_matches('-').to_string()
    }

    /// `<name-slug>-<sku>` so slugs stay unique across colour variants.
    pub fn product_slug(&self, name: &str, sku: &Sku) -> String {
        let name_slug = self.slugify(name);
        let sku_part = sku.as_str().to_lowercase();
        if name_slug.is_empty() {
            sku_part
        } else {
            format!("{}-{}", name_slug, sku_part)
        }
    }

    /// Extracts the product code from an image file name such as
    /// `KS25FH57C-SC.jpg` or `fwdr25ss014g_2.webp`.
    pub fn sku_from_filename(&self, filename: &str) -> Option<Sku> {
        let stem = filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(filename);
        let code: String = stem
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        Sku::parse(&code).ok()
    }
}

fn is_dot_grouped(value: &str) -> bool {
    let mut groups = value.split('.');
    let Some(head) = groups.next() else {
        return false;
    };
    if head.is_empty() || head.len() > 3 || !head.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let mut tail_count = 0;
    for group in groups {
        if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        tail_count += 1;
    }
    tail_count > 0
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

fn fold_vietnamese(c: char) -> char {
    match c {
        'à' | 'á' | 'ả' | 'ã' | 'ạ' | 'ă' | 'ằ' | 'ắ' | 'ẳ' | 'ẵ' | 'ặ' | 'â' | 'ầ' | 'ấ'
        | 'ẩ' | 'ẫ' | 'ậ' => 'a',
        'è' | 'é' | 'ẻ' | 'ẽ' | 'ẹ' | 'ê' | 'ề' | 'ế' | 'ể' | 'ễ' | 'ệ' => 'e',
        'ì' | 'í' | 'ỉ' | 'ĩ' | 'ị' => 'i',
        'ò' | 'ó' | 'ỏ' | 'õ' | 'ọ' | 'ô' | 'ồ' | 'ố' | 'ổ' | 'ỗ' | 'ộ' | 'ơ' | 'ờ' | 'ớ'
        | 'ở' | 'ỡ' | 'ợ' => 'o',
        'ù' | 'ú' | 'ủ' | 'ũ' | 'ụ' | 'ư' | 'ừ' | 'ứ' | 'ử' | 'ữ' | 'ự' => 'u',
        'ỳ' | 'ý' | 'ỷ' | 'ỹ' | 'ỵ' => 'y',
        'đ' => 'd',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_formats() {
        let n = RuleNormalizer;
        assert_eq!(n.parse_price("750,000").unwrap(), 750000.0);
        assert_eq!(n.parse_price("750.000").unwrap(), 750000.0);
        assert_eq!(n.parse_price("1.250.000 ₫").unwrap(), 1250000.0);
        assert_eq!(n.parse_price(" 499000 VND ").unwrap(), 499000.0);
        assert_eq!(n.parse_price("350000đ").unwrap(), 350000.0);
        assert_eq!(n.parse_price("99.5").unwrap(), 99.5);
        assert_eq!(n.parse_price("0").unwrap(), 0.0);
    }

    #[test]
    fn test_invalid_prices() {
        let n = RuleNormalizer;
        assert!(matches!(n.parse_price(""), Err(RecordError::InvalidPrice(_))));
        assert!(matches!(n.parse_price("abc"), Err(RecordError::InvalidPrice(_))));
        assert!(matches!(n.parse_price("-10"), Err(RecordError::InvalidPrice(_))));
        assert!(matches!(n.parse_price("inf"), Err(RecordError::InvalidPrice(_))));
    }

    #[test]
    fn test_transliterate_keeps_case() {
        let n = RuleNormalizer;
        assert_eq!(n.transliterate("Đầm nữ"), "Dam nu");
        assert_eq!(n.transliterate("Phụ kiện"), "Phu kien");
        // decomposed form: a + combining grave
        assert_eq!(n.transliterate("a\u{0300}o"), "ao");
    }

    #[test]
    fn test_slugify() {
        let n = RuleNormalizer;
        assert_eq!(n.slugify("Áo Sơ Mi Nam - Tay Dài"), "ao-so-mi-nam-tay-dai");
        assert_eq!(n.slugify("  Chân váy   nữ!! "), "chan-vay-nu");
        assert_eq!(n.slugify("Đầm (2024)"), "dam-2024");
    }

    #[test]
    fn test_product_slug_appends_sku() {
        let n = RuleNormalizer;
        let sku = Sku::parse("FWDR25SS014G").unwrap();
        assert_eq!(n.product_slug("Đầm nữ tay lỡ", &sku), "dam-nu-tay-lo-fwdr25ss014g");
        assert_eq!(n.product_slug("!!!", &sku), "fwdr25ss014g");
    }

    #[test]
    fn test_sku_from_filename() {
        let n = RuleNormalizer;
        assert_eq!(
            n.sku_from_filename("ks25fh57c-sc.jpg").unwrap().as_str(),
            "KS25FH57C"
        );
        assert_eq!(
            n.sku_from_filename("FWDR25SS014G_2.webp").unwrap().as_str(),
            "FWDR25SS014G"
        );
        assert!(n.sku_from_filename("-x.jpg").is_none());
    }

    #[test]
    fn test_normalize_dataframe_trims() {
        let mut df = df!(
            "sku" => &[" ts24ss01 ", "KS25FH57C"],
            "name" => &["Áo thun nam  ", " Áo khoác"]
        )
        .unwrap();
        RuleNormalizer.normalize_dataframe(&mut df).unwrap();
        let skus: Vec<Option<&str>> = df.column("sku").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(skus, vec![Some("ts24ss01"), Some("KS25FH57C")]);
    }
}
