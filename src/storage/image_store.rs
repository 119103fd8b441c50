use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::models::{Category, ImageIssue, ImageLookup, Sku};
use crate::processor::RuleNormalizer;

pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];
pub const PLACEHOLDER_IMAGE: &str = "/images/default-product.jpg";

const URL_PREFIXES: [&str; 3] = ["/home/~/images/", "~/images/", "/images/"];

/// Read-only listing of the per-category image folders.
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    root: PathBuf,
    url_prefix: String,
    /// folder name -> sorted file names
    folders: BTreeMap<String, Vec<String>>,
    category_folders: BTreeMap<Category, String>,
}

impl ImageIndex {
    /// Lists every category folder under `root`. The transliterated folder is
    /// preferred; the accented label folder is used when only that one exists.
    pub fn scan(root: &Path, url_prefix: &str) -> Result<Self> {
        let mut index = ImageIndex {
            root: root.to_path_buf(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
            ..Default::default()
        };

        if !root.is_dir() {
            warn!("⚠️ Image root {} does not exist, every image lookup will miss", root.display());
            return Ok(index);
        }

        for category in Category::ALL {
            let candidates = [category.folder(), category.label()];
            let Some(folder) = candidates.iter().find(|name| root.join(name).is_dir()) else {
                warn!(
                    "⚠️ No image folder for {} (looked for '{}' and '{}')",
                    category,
                    category.folder(),
                    category.label()
                );
                continue;
            };

            let files = list_images(&root.join(folder))?;
            debug!("{}: {} images in {}", category, files.len(), folder);
            index.category_folders.insert(category, folder.to_string());
            index.folders.insert(folder.to_string(), files);
        }

        info!(
            "✅ Indexed {} images across {} folders under {}",
            index.file_count(),
            index.folders.len(),
            root.display()
        );
        Ok(index)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_count(&self) -> usize {
        self.folders.values().map(Vec::len).sum()
    }

    pub fn folder_for(&self, category: Category) -> Option<&str> {
        self.category_folders.get(&category).map(String::as_str)
    }

    pub fn files_in(&self, category: Category) -> &[String] {
        self.folder_for(category)
            .and_then(|folder| self.folders.get(folder))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn url_for(&self, folder: &str, file: &str) -> String {
        format!("{}/{}/{}", self.url_prefix, folder, file)
    }

    /// Looks for `{SKU}.{ext}` in the category folder, then for a file whose stem
    /// equals the SKU ignoring case.
    pub fn resolve_sku(&self, sku: &Sku, category: Category) -> ImageLookup {
        let Some(folder) = self.folder_for(category) else {
            return not_found(ImageIssue::MissingFolder);
        };
        let files = self.files_in(category);

        for ext in IMAGE_EXTENSIONS {
            for candidate in [
                format!("{}.{}", sku, ext),
                format!("{}.{}", sku, ext.to_uppercase()),
            ] {
                if files.iter().any(|file| *file == candidate) {
                    return ImageLookup::Found {
                        url: self.url_for(folder, &candidate),
                    };
                }
            }
        }

        let wanted = sku.as_str().to_lowercase();
        match files.iter().find(|file| stem_lower(file) == wanted) {
            Some(actual) => ImageLookup::CaseMismatch {
                recorded: self.url_for(folder, &format!("{}.jpg", sku)),
                actual_url: self.url_for(folder, actual),
            },
            None => not_found(ImageIssue::MissingFile),
        }
    }

    /// Checks a stored image URL against the files on disk.
    pub fn resolve_url(&self, url: &str) -> ImageLookup {
        let recorded = url.trim();
        if recorded.is_empty() {
            return not_found(ImageIssue::EmptyUrl);
        }

        let relative = self.strip_prefix(recorded);
        let parts: Vec<&str> = relative.split('/').collect();
        let [folder, filename] = parts.as_slice() else {
            return not_found(ImageIssue::MalformedUrl);
        };
        if folder.is_empty() || filename.is_empty() {
            return not_found(ImageIssue::MalformedUrl);
        }
        // accented label folders are a supported layout, only the file name must be ASCII
        if !filename.is_ascii() {
            return not_found(ImageIssue::AccentedFilename);
        }

        let Some(files) = self.folders.get(*folder) else {
            return not_found(ImageIssue::MissingFolder);
        };

        if files.iter().any(|file| file.as_str() == *filename) {
            return ImageLookup::Found {
                url: recorded.to_string(),
            };
        }

        let filename_lower = filename.to_lowercase();
        let stem = stem_lower(filename);
        let actual = files
            .iter()
            .find(|file| file.to_lowercase() == filename_lower)
            .or_else(|| files.iter().find(|file| stem_lower(file) == stem));

        match actual {
            Some(actual) => ImageLookup::CaseMismatch {
                recorded: recorded.to_string(),
                actual_url: self.url_for(folder, actual),
            },
            None => not_found(ImageIssue::MissingFile),
        }
    }

    /// Resolves a product's image: the stored URL first, then any file named after
    /// the SKU. An empty URL with a matching SKU file is still reported so the URL
    /// gets filled in.
    pub fn resolve_product(&self, url: Option<&str>, sku: &Sku, category: Category) -> ImageLookup {
        let recorded = url.map(str::trim).unwrap_or("");
        let lookup = self.resolve_url(recorded);

        match lookup {
            ImageLookup::NotFound { reason, .. } => match self.find_by_sku(sku, category) {
                Some(actual_url) if actual_url == recorded => ImageLookup::Found { url: actual_url },
                Some(actual_url) => ImageLookup::SkuMatch {
                    recorded: recorded.to_string(),
                    actual_url,
                },
                None => not_found(reason),
            },
            ImageLookup::CaseMismatch { actual_url, .. } if actual_url == recorded => {
                ImageLookup::Found { url: actual_url }
            }
            other => other,
        }
    }

    /// First file whose name starts with the SKU code, searching the category's
    /// own folder before the others.
    pub fn find_by_sku(&self, sku: &Sku, category: Category) -> Option<String> {
        let own = self.folder_for(category);
        let ordered = own
            .into_iter()
            .chain(self.folders.keys().map(String::as_str).filter(|f| Some(*f) != own));

        for folder in ordered {
            let Some(files) = self.folders.get(folder) else {
                continue;
            };
            if let Some(file) = files
                .iter()
                .find(|file| RuleNormalizer.sku_from_filename(file).as_ref() == Some(sku))
            {
                return Some(self.url_for(folder, file));
            }
        }
        None
    }

    /// Every SKU that has at least one image, with the URL of its first file.
    pub fn image_skus(&self) -> BTreeMap<Sku, String> {
        let mut skus = BTreeMap::new();
        for (folder, files) in &self.folders {
            for file in files {
                if let Some(sku) = RuleNormalizer.sku_from_filename(file) {
                    skus.entry(sku).or_insert_with(|| self.url_for(folder, file));
                }
            }
        }
        skus
    }

    fn strip_prefix<'a>(&self, url: &'a str) -> &'a str {
        let configured = format!("{}/", self.url_prefix);
        let stripped = URL_PREFIXES
            .iter()
            .copied()
            .chain(std::iter::once(configured.as_str()))
            .find_map(|prefix| url.strip_prefix(prefix))
            .unwrap_or(url);
        stripped.trim_start_matches('/')
    }
}

fn not_found(reason: ImageIssue) -> ImageLookup {
    ImageLookup::NotFound {
        reason,
        placeholder_url: PLACEHOLDER_IMAGE.to_string(),
    }
}

fn stem_lower(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename)
        .to_lowercase()
}

fn is_image(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn list_images(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list image folder: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || !is_image(&name) {
            continue;
        }
        files.push(name);
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture(files: &[&str]) -> (TempDir, ImageIndex) {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"img").unwrap();
        }
        let index = ImageIndex::scan(dir.path(), "/images").unwrap();
        (dir, index)
    }

    fn sku(raw: &str) -> Sku {
        Sku::parse(raw).unwrap()
    }

    #[test]
    fn test_scan_skips_dotfiles_and_non_images() {
        let (_dir, index) = fixture(&[
            "ao-nam/TS24SS01.jpg",
            "ao-nam/.DS_Store",
            "ao-nam/notes.txt",
            "dam-nu/FWDR25SS014G.WEBP",
        ]);
        assert_eq!(index.file_count(), 2);
        assert_eq!(index.folder_for(Category::AoNam), Some("ao-nam"));
        assert_eq!(index.folder_for(Category::QuanNam), None);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let index = ImageIndex::scan(&dir.path().join("nope"), "/images").unwrap();
        assert_eq!(index.file_count(), 0);
        assert_eq!(
            index.resolve_sku(&sku("TS24SS01"), Category::AoNam),
            not_found(ImageIssue::MissingFolder)
        );
    }

    #[test]
    fn test_accented_label_folder_fallback() {
        let (_dir, index) = fixture(&["Đầm nữ/FWDR25SS014G.jpg"]);
        assert_eq!(index.folder_for(Category::DamNu), Some("Đầm nữ"));
        assert!(index.resolve_sku(&sku("FWDR25SS014G"), Category::DamNu).is_found());
    }

    #[test]
    fn test_accented_label_folder_urls_resolve() {
        let (_dir, index) = fixture(&["Đầm nữ/FWDR25SS014G.jpg"]);
        let sku = sku("FWDR25SS014G");
        let issued = index.resolve_sku(&sku, Category::DamNu);
        assert_eq!(issued.url(), "/images/Đầm nữ/FWDR25SS014G.jpg");

        assert!(index.resolve_url(issued.url()).is_found());
        let lookup = index.resolve_product(Some(issued.url()), &sku, Category::DamNu);
        assert!(lookup.is_found());

        let accented_file = index.resolve_url("/images/Đầm nữ/đầm-xòe.jpg");
        assert!(matches!(
            accented_file,
            ImageLookup::NotFound {
                reason: ImageIssue::AccentedFilename,
                ..
            }
        ));
    }

    #[test]
    fn test_resolve_sku() {
        let (_dir, index) = fixture(&["dam-nu/FWDR25SS014G.jpg", "ao-nam/ts24ss01.png"]);
        assert_eq!(
            index.resolve_sku(&sku("FWDR25SS014G"), Category::DamNu),
            ImageLookup::Found {
                url: "/images/dam-nu/FWDR25SS014G.jpg".to_string()
            }
        );
        assert_eq!(
            index.resolve_sku(&sku("TS24SS01"), Category::AoNam),
            ImageLookup::CaseMismatch {
                recorded: "/images/ao-nam/TS24SS01.jpg".to_string(),
                actual_url: "/images/ao-nam/ts24ss01.png".to_string(),
            }
        );
        assert_eq!(
            index.resolve_sku(&sku("TS24SS02"), Category::AoNam),
            not_found(ImageIssue::MissingFile)
        );
    }

    #[test]
    fn test_resolve_url_case_mismatch() {
        let (_dir, index) = fixture(&["ao-nam/ks25fh57c-sc.jpg"]);
        let lookup = index.resolve_url("/images/ao-nam/KS25FH57C-SC.jpg");
        assert_eq!(
            lookup,
            ImageLookup::CaseMismatch {
                recorded: "/images/ao-nam/KS25FH57C-SC.jpg".to_string(),
                actual_url: "/images/ao-nam/ks25fh57c-sc.jpg".to_string(),
            }
        );
        assert!(index.resolve_url("~/images/ao-nam/ks25fh57c-sc.jpg").is_found());
        assert!(index.resolve_url("/home/~/images/ao-nam/ks25fh57c-sc.jpg").is_found());
    }

    #[test]
    fn test_resolve_url_problems() {
        let (_dir, index) = fixture(&["ao-nam/ks25fh57c-sc.jpg"]);
        let reason = |url: &str| match index.resolve_url(url) {
            ImageLookup::NotFound { reason, .. } => Some(reason),
            _ => None,
        };
        assert_eq!(reason(""), Some(ImageIssue::EmptyUrl));
        assert_eq!(reason("/images/ao-nam/áo-sơ-mi.jpg"), Some(ImageIssue::AccentedFilename));
        assert_eq!(reason("/images/ks25fh57c-sc.jpg"), Some(ImageIssue::MalformedUrl));
        assert_eq!(reason("/images/quan-nam/DP01.jpg"), Some(ImageIssue::MissingFolder));
        assert_eq!(reason("/images/ao-nam/KS99.jpg"), Some(ImageIssue::MissingFile));
    }

    #[test]
    fn test_resolve_product_falls_back_to_sku_file() {
        let (_dir, index) = fixture(&["ao-nam/KS25FH57C-SC.jpg"]);
        let lookup = index.resolve_product(
            Some("/images/ao-nam/old-name.jpg"),
            &sku("KS25FH57C"),
            Category::AoNam,
        );
        assert_eq!(
            lookup,
            ImageLookup::SkuMatch {
                recorded: "/images/ao-nam/old-name.jpg".to_string(),
                actual_url: "/images/ao-nam/KS25FH57C-SC.jpg".to_string(),
            }
        );

        let empty = index.resolve_product(None, &sku("TS01"), Category::AoNam);
        assert_eq!(empty, not_found(ImageIssue::EmptyUrl));
    }

    #[test]
    fn test_image_skus() {
        let (_dir, index) = fixture(&["ao-nam/KS25FH57C-SC.jpg", "ao-nam/ks25fh57c-bk.jpg"]);
        let skus = index.image_skus();
        assert_eq!(skus.len(), 1);
        assert_eq!(
            skus.get(&sku("KS25FH57C")).map(String::as_str),
            Some("/images/ao-nam/KS25FH57C-SC.jpg")
        );
    }
}
