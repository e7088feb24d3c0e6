//! Activity exports already downloaded to a local directory.
//!
//! Layout, one directory per section:
//! ```text
//! exports/
//!   section=4021/
//!     course_report_2024-01-20_0759_PST.csv
//!     course_report_2024-01-27_0759_PST.csv
//!   section=4022/
//!     ...
//! ```

use anyhow::{Context, Result, anyhow, bail};
use gradebook_rollup::export::{ExportRequest, ExportSource, RawExport};
use gradebook_rollup::section::SectionId;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// A downloaded export file.
struct ExportFile {
    name: String,
    text: String,
}

/// Every CSV export of the requested sections, read into memory up front.
pub struct DirectoryExports {
    files: HashMap<SectionId, Vec<ExportFile>>,
}

impl DirectoryExports {
    /// Reads all section directories concurrently.
    #[tracing::instrument(skip(section_ids), fields(sections = section_ids.len()))]
    pub async fn load(dir: &str, section_ids: &[SectionId]) -> Result<Self> {
        let mut tasks = vec![];
        for &section_id in section_ids {
            let section_dir = Path::new(dir).join(format!("section={section_id}"));
            tasks.push(tokio::spawn(async move {
                let files = read_section_dir(&section_dir)
                    .await
                    .with_context(|| format!("failed to read {}", section_dir.display()))?;
                Ok::<_, anyhow::Error>((section_id, files))
            }));
        }

        let mut files = HashMap::new();
        for task in tasks {
            let (section_id, section_files) = task.await??;
            debug!(section_id, count = section_files.len(), "Loaded section exports");
            files.insert(section_id, section_files);
        }

        info!(dir, sections = files.len(), "Exports loaded");
        Ok(Self { files })
    }
}

async fn read_section_dir(dir: &Path) -> Result<Vec<ExportFile>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let text = tokio::fs::read_to_string(&path).await?;
        files.push(ExportFile { name, text });
    }

    Ok(files)
}

impl ExportSource for DirectoryExports {
    fn export(&self, request: &ExportRequest<'_>) -> Result<RawExport> {
        let [section_id] = request.section_ids else {
            bail!("local exports hold one section per file");
        };
        if request.include_time_spent {
            debug!(section_id, "Time spent columns depend on how the file was exported");
        }

        let suffix = request.date.report_name_suffix();
        let files = self
            .files
            .get(section_id)
            .ok_or_else(|| anyhow!("no exports loaded for section {section_id}"))?;

        let mut matching = files.iter().filter(|f| f.name.contains(&suffix));
        let file = matching
            .next()
            .ok_or_else(|| anyhow!("no export for section {section_id} with suffix {suffix}"))?;
        if matching.next().is_some() {
            bail!("several exports for section {section_id} with suffix {suffix}");
        }

        Ok(RawExport::from_csv(file.name.clone(), &file.text)?)
    }
}
