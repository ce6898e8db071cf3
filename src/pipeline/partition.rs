//! Groups uploaded files into jobs by the leading digit run in their
//! filenames.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::FileUpload;

/// Files whose names carry no job prefix group under this sentinel.
pub const UNKNOWN_JOB_ID: &str = "unknown";

static JOB_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[_^]").expect("job id regex"));

/// Extract the job ID from a filename: the leading decimal digits
/// terminated by `_` or `^`. Anything else maps to [`UNKNOWN_JOB_ID`].
///
/// `"2219477116_AWB.pdf"` → `"2219477116"`,
/// `"2219477116^^13387052^FRML.pdf"` → `"2219477116"`.
pub fn job_id_for(filename: &str) -> String {
    JOB_ID_RE
        .captures(filename)
        .map(|captures| captures[1].to_string())
        .unwrap_or_else(|| UNKNOWN_JOB_ID.to_string())
}

/// One job's worth of uploads.
#[derive(Debug)]
pub struct JobGroup {
    pub job_id: String,
    pub files: Vec<FileUpload>,
}

/// Partition uploads into jobs. Groups appear in the order their job ID
/// was first seen; files keep their upload order within a group. The
/// manifest relies on this ordering staying deterministic.
pub fn partition(files: Vec<FileUpload>) -> Vec<JobGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<FileUpload>> = HashMap::new();

    for file in files {
        let job_id = job_id_for(&file.filename);
        grouped
            .entry(job_id.clone())
            .or_insert_with(|| {
                order.push(job_id.clone());
                Vec::new()
            })
            .push(file);
    }

    order
        .into_iter()
        .map(|job_id| {
            let files = grouped.remove(&job_id).unwrap_or_default();
            JobGroup { job_id, files }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn upload(name: &str) -> FileUpload {
        FileUpload::new(name, Bytes::from_static(b"%PDF-1.4"))
    }

    #[test]
    fn extracts_id_before_underscore() {
        assert_eq!(job_id_for("2219477116_AWB.pdf"), "2219477116");
        assert_eq!(job_id_for("2555462195_INV.pdf"), "2555462195");
    }

    #[test]
    fn extracts_id_before_caret() {
        assert_eq!(job_id_for("2219477116^^13387052^FRML.pdf"), "2219477116");
    }

    #[test]
    fn missing_prefix_maps_to_unknown() {
        assert_eq!(job_id_for("report.pdf"), UNKNOWN_JOB_ID);
        assert_eq!(job_id_for("holdingarea_1470585675_x.pdf"), UNKNOWN_JOB_ID);
        assert_eq!(job_id_for(""), UNKNOWN_JOB_ID);
    }

    #[test]
    fn digits_without_terminator_map_to_unknown() {
        assert_eq!(job_id_for("2219477116.pdf"), UNKNOWN_JOB_ID);
    }

    #[test]
    fn groups_preserve_encounter_order() {
        let jobs = partition(vec![
            upload("2219477116_AWB.pdf"),
            upload("2555462195_INV.pdf"),
            upload("2219477116_ENT.pdf"),
            upload("2555462195_ENT.pdf"),
        ]);

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id, "2219477116");
        assert_eq!(jobs[1].job_id, "2555462195");
        assert_eq!(jobs[0].files.len(), 2);
        assert_eq!(jobs[0].files[0].filename, "2219477116_AWB.pdf");
        assert_eq!(jobs[0].files[1].filename, "2219477116_ENT.pdf");
    }

    #[test]
    fn unprefixed_files_share_the_unknown_group() {
        let jobs = partition(vec![
            upload("scan.pdf"),
            upload("1111_ENT.pdf"),
            upload("notes.pdf"),
        ]);

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id, UNKNOWN_JOB_ID);
        assert_eq!(jobs[0].files.len(), 2);
        assert_eq!(jobs[1].job_id, "1111");
    }

    #[test]
    fn empty_input_partitions_to_no_jobs() {
        assert!(partition(vec![]).is_empty());
    }
}
