use anyhow::Result;
use regex::Regex;
use serde::Serialize;

use crate::models::{Category, FREELANCER_SKU_PREFIX};

/// One row of the rule table: SKU prefixes, name keywords and exclusion tokens
/// for a single category.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub category: Category,
    pub sku_patterns: Vec<Regex>,
    pub keywords: Vec<&'static str>,
    pub exclude: Vec<&'static str>,
}

impl CategoryRule {
    fn new(
        category: Category,
        sku_prefixes: &[&str],
        keywords: &[&'static str],
        exclude: &[&'static str],
    ) -> Result<Self> {
        let sku_patterns = sku_prefixes
            .iter()
            .map(|prefix| Regex::new(&format!(r"^{}\d{{2}}", prefix)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CategoryRule {
            category,
            sku_patterns,
            keywords: keywords.to_vec(),
            exclude: exclude.to_vec(),
        })
    }

    /// An exclusion token disqualifies the rule when it appears anywhere in the SKU
    /// or in the name, ignoring case.
    pub fn is_excluded(&self, sku: &str, name: &str) -> bool {
        let sku_lower = sku.to_lowercase();
        let name_lower = name.to_lowercase();
        self.exclude
            .iter()
            .any(|token| sku_lower.contains(token) || name_lower.contains(token))
    }

    fn matches_sku(&self, sku_upper: &str) -> bool {
        self.sku_patterns.iter().any(|re| re.is_match(sku_upper))
    }

    fn matches_keyword(&self, name_lower: &str) -> bool {
        self.keywords.iter().any(|kw| name_lower.contains(kw))
    }
}

/// Which stage of the classifier produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    SkuPattern,
    Keyword,
    Fallback,
    Default,
}

const ACCESSORY_KEYWORDS: [&str; 8] = [
    "thắt lưng", "cà vạt", "belt", "balo", "ví", "vớ", "giày", "dép",
];

pub struct CategoryClassifier {
    rules: Vec<CategoryRule>,
}

impl CategoryClassifier {
    /// Builds the ordered rule table: women's lines, then men's clothing, then
    /// men's accessories.
    pub fn new() -> Result<Self> {
        let rules = vec![
            CategoryRule::new(
                Category::AoNu,
                &["FWWS", "FWTS", "FWKS", "FWJK", "FWBZ", "FWBL", "FWSW", "FWTT"],
                &[
                    "áo sơ mi nữ", "áo thun nữ", "áo polo nữ", "áo khoác nữ", "áo blouse",
                    "áo kiểu nữ", "áo blazer nữ", "áo vest nữ", "áo len nữ", "croptop",
                    "tank top nữ", "tanktop nữ", "freelancer",
                ],
                &[],
            )?,
            CategoryRule::new(
                Category::QuanNu,
                &["FWDP", "FWSP", "FWJN"],
                &["quần tây nữ", "quần âu nữ", "quần short nữ", "quần jeans nữ", "quần baggy"],
                &[],
            )?,
            CategoryRule::new(
                Category::ChanVayNu,
                &["FWSK"],
                &["chân váy", "váy", "skirt", "mini skirt", "midi", "quần váy"],
                &[],
            )?,
            CategoryRule::new(
                Category::DamNu,
                &["FWDR"],
                &["đầm", "dress", "váy đầm"],
                &[],
            )?,
            CategoryRule::new(
                Category::PhuKienNu,
                &["FWSG", "FWBE"],
                &["mắt kính nữ", "túi nữ", "balo nữ", "ví nữ", "thắt lưng nữ"],
                &[],
            )?,
            CategoryRule::new(
                Category::AoNam,
                &["WS", "TS", "KS", "JK", "BZ", "SW", "SS", "TK"],
                &[
                    "áo sơ mi nam", "áo thun nam", "áo polo nam", "áo khoác nam", "áo vest nam",
                    "áo blazer nam", "áo len nam", "sweater nam", "áo tanktop", "tank top",
                ],
                &["fwws", "fwts", "fwks", "fwjk", "fwbz", "fwsw", "fwbl"],
            )?,
            CategoryRule::new(
                Category::QuanNam,
                &["DP", "SP", "JN", "KP"],
                &[
                    "quần tây nam", "quần âu nam", "quần short nam", "quần jeans nam",
                    "quần kaki nam", "quần chinos",
                ],
                &["fwdp", "fwsp", "fwjn"],
            )?,
            CategoryRule::new(
                Category::PhuKienNam,
                &["BE", "CT", "CB", "BA", "WT", "SK", "SO", "SG", "CA"],
                &[
                    "thắt lưng", "cà vạt", "belt", "tie", "balo", "ví", "vớ", "mắt kính", "nón",
                    "giày", "dép", "sandal", "đồng hồ",
                ],
                &["fwbe", "fwsg", "nữ"],
            )?,
        ];

        Ok(CategoryClassifier { rules })
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn rule_for(&self, category: Category) -> Option<&CategoryRule> {
        self.rules.iter().find(|rule| rule.category == category)
    }

    pub fn classify(&self, sku: &str, name: &str) -> Category {
        self.classify_with_source(sku, name).0
    }

    pub fn classify_with_source(&self, sku: &str, name: &str) -> (Category, MatchSource) {
        let sku_upper = sku.trim().to_uppercase();
        let name_lower = name.to_lowercase();

        for rule in &self.rules {
            if rule.is_excluded(&sku_upper, &name_lower) {
                continue;
            }
            if rule.matches_sku(&sku_upper) {
                return (rule.category, MatchSource::SkuPattern);
            }
            if rule.matches_keyword(&name_lower) {
                return (rule.category, MatchSource::Keyword);
            }
        }

        let (category, source) = self.fallback(&sku_upper, &name_lower);
        if self.is_excluded(category, &sku_upper, &name_lower) {
            // Áo nữ has no exclusion tokens
            return (Category::AoNu, source);
        }
        (category, source)
    }

    /// True when the category's own exclusion tokens match this product.
    pub fn is_excluded(&self, category: Category, sku: &str, name: &str) -> bool {
        self.rule_for(category)
            .map(|rule| rule.is_excluded(sku, name))
            .unwrap_or(false)
    }

    fn fallback(&self, sku_upper: &str, name_lower: &str) -> (Category, MatchSource) {
        let female = name_lower.contains("nữ") || sku_upper.starts_with(FREELANCER_SKU_PREFIX);

        let category = if name_lower.contains("đầm") || name_lower.contains("dress") {
            Category::DamNu
        } else if name_lower.contains("váy") || name_lower.contains("skirt") {
            Category::ChanVayNu
        } else if name_lower.contains("quần") {
            if female { Category::QuanNu } else { Category::QuanNam }
        } else if name_lower.contains("áo") {
            if female { Category::AoNu } else { Category::AoNam }
        } else if ACCESSORY_KEYWORDS.iter().any(|kw| name_lower.contains(kw)) {
            if female { Category::PhuKienNu } else { Category::PhuKienNam }
        } else if sku_upper.starts_with(FREELANCER_SKU_PREFIX) {
            return (Category::AoNu, MatchSource::Default);
        } else {
            return (Category::AoNam, MatchSource::Default);
        };

        (category, MatchSource::Fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> CategoryClassifier {
        CategoryClassifier::new().unwrap()
    }

    #[test]
    fn test_sku_patterns() {
        let c = classifier();
        assert_eq!(c.classify("FWDR25SS014G", "Đầm nữ tay lỡ"), Category::DamNu);
        assert_eq!(c.classify("FWBL24FH03", "Áo kiểu"), Category::AoNu);
        assert_eq!(c.classify("FWSK24SS11", "Chân váy chữ A"), Category::ChanVayNu);
        assert_eq!(c.classify("KS25FH57C", "Áo polo"), Category::AoNam);
        assert_eq!(c.classify("DP24SS02", "Quần tây"), Category::QuanNam);
        assert_eq!(c.classify("be24ss01", "Thắt lưng da"), Category::PhuKienNam);
    }

    #[test]
    fn test_source_reporting() {
        let c = classifier();
        assert_eq!(
            c.classify_with_source("FWDR25SS014G", "x"),
            (Category::DamNu, MatchSource::SkuPattern)
        );
        assert_eq!(
            c.classify_with_source("ZZ0001", "Áo sơ mi nam trắng"),
            (Category::AoNam, MatchSource::Keyword)
        );
        assert_eq!(
            c.classify_with_source("ZZ0001", "Quần dài"),
            (Category::QuanNam, MatchSource::Fallback)
        );
        assert_eq!(
            c.classify_with_source("ZZ0001", "Gift card"),
            (Category::AoNam, MatchSource::Default)
        );
        assert_eq!(
            c.classify_with_source("FWZZ0001", "Gift card"),
            (Category::AoNu, MatchSource::Default)
        );
    }

    #[test]
    fn test_exclusion_skips_mens_rules() {
        let c = classifier();
        // "nữ" excludes men's accessories even though "ví" matches
        assert_eq!(c.classify("ZZ01", "Ví da nữ"), Category::PhuKienNu);
        assert_eq!(
            c.classify_with_source("ZZ01", "Ví da nữ").1,
            MatchSource::Fallback
        );
        assert_ne!(c.classify("FWSP24SS01", "Quần short"), Category::QuanNam);
    }

    #[test]
    fn test_fallback_gender() {
        let c = classifier();
        assert_eq!(c.classify("FWXX01", "Quần dài"), Category::QuanNu);
        assert_eq!(c.classify("XX01", "Áo dài cách tân"), Category::AoNam);
        assert_eq!(c.classify("FWXX01", "Áo dài cách tân"), Category::AoNu);
    }

    #[test]
    fn test_classifier_is_total_and_honours_exclusions() {
        let c = classifier();
        let skus = [
            "", "FW", "FWWS01", "FWSP99", "FWBE12", "FWSG01", "WS01", "SK12", "FWSK12",
            "BE01", "fwdp01", "QQ", "FWQQ77", "123",
        ];
        let names = [
            "", "Áo", "Quần", "Ví", "Ví nữ", "thắt lưng", "dress", "nữ", "gift", "Váy",
            "Sandal nữ", "freelancer",
        ];

        for sku in skus {
            for name in names {
                let category = c.classify(sku, name);
                assert!(Category::ALL.contains(&category));
                assert!(
                    !c.is_excluded(category, &sku.to_uppercase(), name),
                    "{} / {} -> {} which excludes it",
                    sku,
                    name,
                    category
                );
            }
        }
    }

    #[test]
    fn test_freelancer_skus_never_land_in_excluding_categories() {
        let c = classifier();
        for prefix in ["FWWS", "FWTS", "FWKS", "FWJK", "FWBZ", "FWSW", "FWBL"] {
            let sku = format!("{}24SS01", prefix);
            assert_ne!(c.classify(&sku, "Áo thun nam"), Category::AoNam);
        }
        for prefix in ["FWDP", "FWSP", "FWJN"] {
            let sku = format!("{}24SS01", prefix);
            assert_ne!(c.classify(&sku, "Quần tây nam"), Category::QuanNam);
        }
        for prefix in ["FWBE", "FWSG"] {
            let sku = format!("{}24SS01", prefix);
            assert_ne!(c.classify(&sku, "Thắt lưng"), Category::PhuKienNam);
        }
    }
}
