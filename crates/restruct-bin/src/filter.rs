use anyhow::Result;
use regex::Regex;
use restruct_core::File;

/// Conditions for `delete-if`. A file matches when it meets every condition
/// that was given.
#[derive(Debug)]
pub struct DeleteFilter {
    empty: bool,
    extension: Option<String>,
    name_regex: Option<Regex>,
}

impl DeleteFilter {
    pub fn new(empty: bool, extension: Option<String>, name_regex: Option<&str>) -> Result<Self> {
        if !empty && extension.is_none() && name_regex.is_none() {
            anyhow::bail!("At least one of --empty, --extension or --name-regex must be given");
        }

        let name_regex = name_regex
            .map(Regex::new)
            .transpose()
            .map_err(|e| anyhow::anyhow!("Invalid --name-regex: {}", e))?;

        Ok(Self {
            empty,
            extension: extension.map(|ext| ext.trim_start_matches('.').to_lowercase()),
            name_regex,
        })
    }

    pub fn matches(&self, file: &File) -> bool {
        if self.empty && !file.size().map(|size| size == 0).unwrap_or(false) {
            return false;
        }

        if let Some(wanted) = &self.extension {
            let actual = file.extension().trim_start_matches('.').to_lowercase();
            if &actual != wanted {
                return false;
            }
        }

        if let Some(regex) = &self.name_regex {
            if !regex.is_match(&file.name()) {
                return false;
            }
        }

        true
    }
}
