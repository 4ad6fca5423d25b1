use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

fn gxfremap() -> Command {
    Command::new(env!("CARGO_BIN_EXE_gxfremap"))
}

/// Compare an output file with a pre-generated golden file line by line.
fn assert_same_as_golden(
    output_path: &Path,
    golden_filename: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let golden_path = data_dir().join(golden_filename);
    let output_reader = BufReader::new(File::open(output_path)?);
    let golden_reader = BufReader::new(File::open(&golden_path)?);

    let mut line_num = 0;
    for (out_line, gold_line) in output_reader.lines().zip(golden_reader.lines()) {
        line_num += 1;
        let out_line = out_line?;
        let gold_line = gold_line?;
        if out_line != gold_line {
            panic!(
                "Mismatch at line {} ({}): \nExpected: {}\nActual:   {}",
                line_num, golden_filename, gold_line, out_line
            );
        }
    }

    // Catch extra lines on either side
    let out_len = fs::metadata(output_path)?.len();
    let gold_len = fs::metadata(&golden_path)?.len();
    if out_len != gold_len {
        panic!(
            "File sizes differ for {}: Output: {} bytes, Golden: {} bytes",
            golden_filename, out_len, gold_len
        );
    }
    Ok(())
}

#[test]
fn test_golden_output_with_target() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let mapped = dir.path().join("mapped.gff3");
    let unmapped = dir.path().join("unmapped.gff3");

    gxfremap()
        .arg("--src")
        .arg(data_dir().join("source.gff3"))
        .arg("--chain")
        .arg(data_dir().join("source_to_target.chain"))
        .arg("--target")
        .arg(data_dir().join("target.gff3"))
        .arg("--mapped")
        .arg(&mapped)
        .arg("--unmapped")
        .arg(&unmapped)
        .assert()
        .success();

    assert_same_as_golden(&mapped, "golden_mapped.gff3")?;
    assert_same_as_golden(&unmapped, "golden_unmapped.gff3")?;
    Ok(())
}

#[test]
fn test_no_rescue_drops_substitution() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let mapped = dir.path().join("mapped.gff3");

    gxfremap()
        .arg("--src")
        .arg(data_dir().join("source.gff3"))
        .arg("--chain")
        .arg(data_dir().join("source_to_target.chain"))
        .arg("--target")
        .arg(data_dir().join("target.gff3"))
        .arg("--mapped")
        .arg(&mapped)
        .arg("--unmapped")
        .arg(dir.path().join("unmapped.gff3"))
        .arg("--no-rescue")
        .assert()
        .success();

    let text = fs::read_to_string(&mapped)?;
    assert!(text.contains("ID=G1.1;"));
    assert!(!text.contains("G3.2"));
    assert!(!text.contains("substituted"));
    Ok(())
}

#[test]
fn test_without_target_annotation() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let mapped = dir.path().join("mapped.gff3");
    let unmapped = dir.path().join("unmapped.gff3");

    gxfremap()
        .arg("-s")
        .arg(data_dir().join("source.gff3"))
        .arg("-c")
        .arg(data_dir().join("source_to_target.chain"))
        .arg("-m")
        .arg(&mapped)
        .arg("-u")
        .arg(&unmapped)
        .assert()
        .success();

    let mapped_text = fs::read_to_string(&mapped)?;
    assert!(mapped_text.contains("remap_status=full_contig"));
    assert!(!mapped_text.contains("remap_target_status"));
    let unmapped_text = fs::read_to_string(&unmapped)?;
    assert!(unmapped_text.contains("remap_status=no_seq_map"));
    assert_eq!(unmapped_text.lines().filter(|l| !l.starts_with('#')).count(), 6);
    Ok(())
}

#[test]
fn test_gtf_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let mapped = dir.path().join("mapped.gtf");

    gxfremap()
        .arg("--src")
        .arg(data_dir().join("source.gff3"))
        .arg("--chain")
        .arg(data_dir().join("source_to_target.chain"))
        .arg("--mapped")
        .arg(&mapped)
        .arg("--unmapped")
        .arg(dir.path().join("unmapped.gtf"))
        .assert()
        .success();

    let text = fs::read_to_string(&mapped)?;
    assert!(!text.contains("##"));
    let gene_line = text.lines().next().unwrap();
    assert!(gene_line.starts_with("chr1\tHAVANA\tgene\t5101\t6100\t"));
    assert!(gene_line.contains("gene_id \"G1.1\";"));
    assert!(gene_line.contains("remap_status \"full_contig\";"));
    Ok(())
}

#[test]
fn test_target_sizes_missing_sequence() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let sizes = dir.path().join("target.sizes");
    fs::write(&sizes, "chr2\t50000\n")?;

    gxfremap()
        .arg("--src")
        .arg(data_dir().join("source.gff3"))
        .arg("--chain")
        .arg(data_dir().join("source_to_target.chain"))
        .arg("--target-sizes")
        .arg(&sizes)
        .arg("--mapped")
        .arg(dir.path().join("mapped.gff3"))
        .arg("--unmapped")
        .arg(dir.path().join("unmapped.gff3"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("sequence 'chr1' not found"));
    Ok(())
}

#[test]
fn test_target_sizes_used_in_header() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let sizes = dir.path().join("target.sizes");
    fs::write(&sizes, "chr1\t123456\n")?;
    let mapped = dir.path().join("mapped.gff3");

    gxfremap()
        .arg("--src")
        .arg(data_dir().join("source.gff3"))
        .arg("--chain")
        .arg(data_dir().join("source_to_target.chain"))
        .arg("--target-sizes")
        .arg(&sizes)
        .arg("--mapped")
        .arg(&mapped)
        .arg("--unmapped")
        .arg(dir.path().join("unmapped.gff3"))
        .assert()
        .success();

    let text = fs::read_to_string(&mapped)?;
    assert!(text.contains("##sequence-region chr1 1 123456\n"));
    Ok(())
}

#[test]
fn test_malformed_chain_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let chain = dir.path().join("bad.chain");
    fs::write(&chain, "chain 1000 chr1 10000 + 0 10000 chr1 20000 + 0 10000 1\n3000 0\n")?;

    gxfremap()
        .arg("--src")
        .arg(data_dir().join("source.gff3"))
        .arg("--chain")
        .arg(&chain)
        .arg("--mapped")
        .arg(dir.path().join("mapped.gff3"))
        .arg("--unmapped")
        .arg(dir.path().join("unmapped.gff3"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed chain 1"));
    Ok(())
}

#[test]
fn test_missing_input_file() {
    gxfremap()
        .arg("--src")
        .arg("does_not_exist.gff3")
        .arg("--chain")
        .arg(data_dir().join("source_to_target.chain"))
        .arg("--mapped")
        .arg("mapped.gff3")
        .arg("--unmapped")
        .arg("unmapped.gff3")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Source annotation file not found"));
}

#[test]
fn test_invalid_similarity() {
    gxfremap()
        .arg("--src")
        .arg(data_dir().join("source.gff3"))
        .arg("--chain")
        .arg(data_dir().join("source_to_target.chain"))
        .arg("--mapped")
        .arg("mapped.gff3")
        .arg("--unmapped")
        .arg("unmapped.gff3")
        .arg("--min-similarity")
        .arg("1.5")
        .assert()
        .failure()
        .stderr(predicate::str::contains("minimum similarity"));
}
