
use indexmap::IndexMap;
use strum_macros::{Display, EnumIter, EnumString};

/// Raw field-name to field-value mapping, either INFO-level or per-sample FORMAT-level.
/// Values stay untouched strings so caller-specific encodings (e.g. `FREQ=53.1%`) survive.
pub type FieldMap = IndexMap<String, String>;

/// Per-sample mapping: sample name to its FORMAT field values.
pub type SampleMap = IndexMap<String, FieldMap>;

/// The reconciled `(depth, fraction)` pair a parser produces for one sample.
/// Both sides are independently optional; absence is routine, not an error.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SampleDepths {
    /// Total read depth (DP), if supplied or derivable
    pub depth: Option<u64>,
    /// Alternate allele fraction in [0, 1], if determinable
    pub fraction: Option<f64>
}

impl SampleDepths {
    /// Constructor
    pub fn new(depth: Option<u64>, fraction: Option<f64>) -> Self {
        Self {
            depth, fraction
        }
    }
}

/// Errors from the per-format numeric reconciliation rules.
/// These are structural: a record that trips one aborts the current file.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("{field} value {value:?} is not numeric")]
    InvalidNumber { field: &'static str, value: String },
    #[error("{field} value {value:?} does not have enough comma-separated entries")]
    TruncatedList { field: &'static str, value: String },
    #[error("zero total depth in {field} makes the allele fraction undefined")]
    DegenerateDepth { field: &'static str }
}

/// The closed enumeration of supported caller formats. Dispatch is a pure lookup on this tag;
/// adding a caller means adding a variant and its parse function, never touching existing ones.
#[derive(Clone, Copy, Debug, Display, EnumIter, EnumString, Eq, PartialEq)]
pub enum CallerFormat {
    /// Illumina MiSeq amplicon-panel VCFs (VF/DP with AD fallback)
    MiSeq,
    /// Ion Torrent semiconductor-sequencer VCFs (AO/RO/DP)
    IonTorrent,
    /// MuTect tabular `.out` call files (tumor_f + t_ref_count/t_alt_count)
    MuTectOut,
    /// MuTect VCF output (DP/FA per sample)
    MuTectVcf,
    /// GATK SomaticIndelDetector VCFs; deprecated upstream but still accepted
    SomaticIndelDetector,
    /// samtools/bcftools pileup VCFs (DP4 with plain DP fallback)
    Samtools,
    /// VarScan VCFs (DP + percentage-string FREQ)
    VarScan,
    /// GATK HaplotypeCaller VCFs (DP/AD with the called-but-uncovered zero case)
    HaplotypeCaller,
    /// freeBayes VCFs (DP/RO/AO)
    FreeBayes,
    /// Generic GATK-style VCFs (DP/VF with AD-derived fallback)
    GenericGatk,
    /// INFO-level aggregate extraction (VAF/VF/AF + DP/ADP) attached to every sample
    InfoColumn
}

impl CallerFormat {
    /// Produces the reconciled `(depth, fraction)` pair for every sample in the record.
    /// Samples whose format-specific fields are absent still appear in the output with `None`
    /// values; only structurally broken numeric fields raise an error. `MuTectVcf` drops the
    /// placeholder columns of empty samples entirely.
    /// # Arguments
    /// * `info` - the record's INFO field mapping
    /// * `samples` - per-sample FORMAT field mappings
    /// # Errors
    /// * if a present field is non-numeric or truncated
    /// * if a derivation hits an undefined zero-depth division (except the HaplotypeCaller case)
    pub fn parse_samples(&self, info: &FieldMap, samples: &SampleMap) -> Result<IndexMap<String, SampleDepths>, FormatError> {
        let mut out: IndexMap<String, SampleDepths> = Default::default();
        for (sample, values) in samples.iter() {
            let depths = match self {
                CallerFormat::MiSeq => parse_miseq(values)?,
                CallerFormat::IonTorrent => parse_ion_torrent(values)?,
                CallerFormat::MuTectOut => {
                    // tabular files never reach the sample dispatch; treat as an aggregate no-op
                    SampleDepths::default()
                },
                CallerFormat::MuTectVcf => {
                    match parse_mutect_vcf(sample, values)? {
                        Some(sd) => sd,
                        None => continue // empty placeholder column, drop the sample
                    }
                },
                CallerFormat::SomaticIndelDetector => parse_somatic_indel_detector(values)?,
                CallerFormat::Samtools => parse_samtools(values)?,
                CallerFormat::VarScan => parse_varscan(values)?,
                CallerFormat::HaplotypeCaller => parse_haplotype_caller(values)?,
                CallerFormat::FreeBayes => parse_freebayes(values)?,
                CallerFormat::GenericGatk => parse_generic_gatk(values)?,
                CallerFormat::InfoColumn => parse_info_column(info)?
            };
            out.insert(sample.clone(), depths);
        }
        Ok(out)
    }

    /// True for formats that are tabular call files rather than VCF-shaped input.
    pub fn is_tabular(&self) -> bool {
        matches!(self, CallerFormat::MuTectOut)
    }
}

/// Parses an integer field value.
fn parse_u64(field: &'static str, value: &str) -> Result<u64, FormatError> {
    value.trim().parse::<u64>()
        .map_err(|_| FormatError::InvalidNumber { field, value: value.to_string() })
}

/// Parses a float field value.
fn parse_f64(field: &'static str, value: &str) -> Result<f64, FormatError> {
    value.trim().parse::<f64>()
        .map_err(|_| FormatError::InvalidNumber { field, value: value.to_string() })
}

/// Parses a comma-separated list of integers (AD, AO, DP4 style fields).
fn parse_u64_list(field: &'static str, value: &str) -> Result<Vec<u64>, FormatError> {
    value.split(',')
        .map(|v| parse_u64(field, v))
        .collect()
}

/// Splits an `AD` style field into `(ref_depth, alt_depths)`.
fn split_allele_depths(field: &'static str, value: &str) -> Result<(u64, Vec<u64>), FormatError> {
    let counts = parse_u64_list(field, value)?;
    if counts.len() < 2 {
        return Err(FormatError::TruncatedList { field, value: value.to_string() });
    }
    Ok((counts[0], counts[1..].to_vec()))
}

/// MiSeq: primary `VF`/`DP`, with both derivable from `AD` when missing.
/// Depth derived through a known fraction is `round(alt/fraction)`, which reproduces the
/// INFO-level DP; otherwise it falls back to `ref+alt`, which may diverge from true DP when
/// multiple mutations share the position.
fn parse_miseq(values: &FieldMap) -> Result<SampleDepths, FormatError> {
    let mut fraction = values.get("VF")
        .map(|v| parse_f64("VF", v))
        .transpose()?;
    let mut depth = values.get("DP")
        .map(|v| parse_u64("DP", v))
        .transpose()?;

    if fraction.is_some() && depth.is_some() {
        return Ok(SampleDepths::new(depth, fraction));
    }

    if let Some(ad) = values.get("AD") {
        let (ref_depth, alt_depths) = split_allele_depths("AD", ad)?;
        let alt_depth = alt_depths[0];

        if fraction.is_none() {
            let total = ref_depth + alt_depth;
            if total == 0 {
                return Err(FormatError::DegenerateDepth { field: "AD" });
            }
            fraction = Some(alt_depth as f64 / total as f64);
        }

        if depth.is_none() {
            depth = Some(match fraction {
                Some(f) if f > 0.0 => (alt_depth as f64 / f).round() as u64,
                _ => ref_depth + alt_depth
            });
        }
    }

    Ok(SampleDepths::new(depth, fraction))
}

/// Ion Torrent: requires `AO` (summed when multi-valued), `RO`, and `DP`; no fallback.
fn parse_ion_torrent(values: &FieldMap) -> Result<SampleDepths, FormatError> {
    let (ao, ro, dp) = match (values.get("AO"), values.get("RO"), values.get("DP")) {
        (Some(ao), Some(ro), Some(dp)) => (ao, ro, dp),
        _ => return Ok(SampleDepths::default())
    };

    let alt_total: u64 = parse_u64_list("AO", ao)?.iter().sum();
    parse_u64("RO", ro)?; // validated but unused; the fraction is relative to DP
    let depth = parse_u64("DP", dp)?;
    if depth == 0 {
        return Err(FormatError::DegenerateDepth { field: "DP" });
    }

    Ok(SampleDepths::new(Some(depth), Some(alt_total as f64 / depth as f64)))
}

/// MuTect VCF: per-sample `DP`/`FA`. Returns None for the literal placeholder columns MuTect
/// writes for empty samples (`none` with `DP=0` and `BQ=.`), which must be dropped entirely.
fn parse_mutect_vcf(sample: &str, values: &FieldMap) -> Result<Option<SampleDepths>, FormatError> {
    if sample == "none"
        && values.get("DP").map(|v| v.as_str()) == Some("0")
        && values.get("BQ").map(|v| v.as_str()) == Some(".") {
        return Ok(None);
    }

    let depth = values.get("DP")
        .map(|v| parse_u64("DP", v))
        .transpose()?;
    let fraction = values.get("FA")
        .map(|v| parse_f64("FA", v))
        .transpose()?;
    Ok(Some(SampleDepths::new(depth, fraction)))
}

/// SomaticIndelDetector: `fraction = alt_depth / DP`. Deprecated upstream.
fn parse_somatic_indel_detector(values: &FieldMap) -> Result<SampleDepths, FormatError> {
    let depth = match values.get("DP") {
        Some(dp) => parse_u64("DP", dp)?,
        None => return Ok(SampleDepths::default())
    };

    let alt_depth = match values.get("AD") {
        Some(ad) => split_allele_depths("AD", ad)?.1[0],
        None => return Ok(SampleDepths::new(Some(depth), None))
    };

    if depth == 0 {
        return Err(FormatError::DegenerateDepth { field: "DP" });
    }
    Ok(SampleDepths::new(Some(depth), Some(alt_depth as f64 / depth as f64)))
}

/// samtools pileup: `DP4 = ref_fwd,ref_rev,alt_fwd,alt_rev`; depth is the DP4 sum and the
/// fraction is alt/depth. A plain `DP` field is the depth-only fallback when DP4 is absent.
fn parse_samtools(values: &FieldMap) -> Result<SampleDepths, FormatError> {
    if let Some(dp4) = values.get("DP4") {
        let counts = parse_u64_list("DP4", dp4)?;
        if counts.len() != 4 {
            return Err(FormatError::TruncatedList { field: "DP4", value: dp4.to_string() });
        }
        let ref_total = counts[0] + counts[1];
        let alt_total = counts[2] + counts[3];
        let depth = ref_total + alt_total;
        if depth == 0 {
            return Err(FormatError::DegenerateDepth { field: "DP4" });
        }
        return Ok(SampleDepths::new(Some(depth), Some(alt_total as f64 / depth as f64)));
    }

    let depth = values.get("DP")
        .map(|v| parse_u64("DP", v))
        .transpose()?;
    Ok(SampleDepths::new(depth, None))
}

/// VarScan: `FREQ` is a percentage string (e.g. `53.11%`), scaled down to [0, 1].
fn parse_varscan(values: &FieldMap) -> Result<SampleDepths, FormatError> {
    let depth = values.get("DP")
        .map(|v| parse_u64("DP", v))
        .transpose()?;
    let fraction = values.get("FREQ")
        .map(|v| parse_f64("FREQ", v.trim_matches('%')))
        .transpose()?
        .map(|percent| percent / 100.0);
    Ok(SampleDepths::new(depth, fraction))
}

/// HaplotypeCaller: `fraction = alt/(ref+alt)` from `AD`. A site with
/// `ref == alt == depth == 0` was called but not covered; it reconciles to `fraction = 0`
/// instead of an undefined division.
fn parse_haplotype_caller(values: &FieldMap) -> Result<SampleDepths, FormatError> {
    let depth = match values.get("DP") {
        Some(dp) => parse_u64("DP", dp)?,
        None => return Ok(SampleDepths::default())
    };

    let (ref_depth, alt_depths) = match values.get("AD") {
        Some(ad) => split_allele_depths("AD", ad)?,
        None => return Ok(SampleDepths::new(Some(depth), None))
    };
    let alt_depth = alt_depths[0];

    let total = ref_depth + alt_depth;
    let fraction = if total == 0 {
        if depth == 0 {
            // called, but not covered
            Some(0.0)
        } else {
            None
        }
    } else {
        Some(alt_depth as f64 / total as f64)
    };

    Ok(SampleDepths::new(Some(depth), fraction))
}

/// freeBayes: `fraction = sum(AO) / (sum(AO) + RO)`.
fn parse_freebayes(values: &FieldMap) -> Result<SampleDepths, FormatError> {
    let depth = match values.get("DP") {
        Some(dp) => parse_u64("DP", dp)?,
        None => return Ok(SampleDepths::default())
    };

    let (ro, ao) = match (values.get("RO"), values.get("AO")) {
        (Some(ro), Some(ao)) => (ro, ao),
        _ => return Ok(SampleDepths::new(Some(depth), None))
    };
    let ref_total = parse_u64("RO", ro)?;
    let alt_total: u64 = parse_u64_list("AO", ao)?.iter().sum();

    let total = ref_total + alt_total;
    if total == 0 {
        return Err(FormatError::DegenerateDepth { field: "AO" });
    }
    Ok(SampleDepths::new(Some(depth), Some(alt_total as f64 / total as f64)))
}

/// Generic GATK-style records: primary `DP`/`VF`; when either is missing, both are derived from
/// `AD` as `(ref, sum(alt_1..n))`. The ref+alt sum may legitimately be zero (no mutant
/// identified), in which case the derivation is skipped rather than dividing.
fn parse_generic_gatk(values: &FieldMap) -> Result<SampleDepths, FormatError> {
    let mut depth = values.get("DP")
        .map(|v| parse_u64("DP", v))
        .transpose()?;
    let mut fraction = values.get("VF")
        .map(|v| parse_f64("VF", v))
        .transpose()?;

    if depth.is_none() || fraction.is_none() {
        if let Some(ad) = values.get("AD") {
            let (ref_depth, alt_depths) = split_allele_depths("AD", ad)?;
            let alt_total: u64 = alt_depths.iter().sum();
            let total = ref_depth + alt_total;
            if depth.is_none() && total > 0 {
                depth = Some(total);
                // one fraction covering all alternate alleles at the site
                fraction = Some(alt_total as f64 / total as f64);
            }
        }
    }

    Ok(SampleDepths::new(depth, fraction))
}

/// INFO-level aggregate extraction: the summed `VAF`/`VF`/`AF` and the `DP`/`ADP` values are
/// attached identically to every sample in the record. Later keys in each list take precedence
/// when several are present.
fn parse_info_column(info: &FieldMap) -> Result<SampleDepths, FormatError> {
    let mut fraction = None;
    for key in ["VAF", "VF", "AF"] {
        if let Some(value) = info.get(key) {
            let parts: Vec<f64> = value.split(',')
                .map(|v| parse_f64("VAF/VF/AF", v))
                .collect::<Result<_, _>>()?;
            // sum across multi-allelic entries
            fraction = Some(parts.iter().sum());
        }
    }

    let mut depth = None;
    for key in ["DP", "ADP"] {
        if let Some(value) = info.get(key) {
            depth = Some(parse_u64("DP/ADP", value)?);
        }
    }

    Ok(SampleDepths::new(depth, fraction))
}
