//! The three-phase alignment pipeline: sample → load → score.
//!
//! 1. **Sample** builds the DF table from every n-th document of both input
//!    files, with worker-local maps merged under a mutex.
//! 2. **Load** re-reads the translated file in full and turns every line
//!    into an L2-normalized [`DocumentRef`], each worker writing only the
//!    slot for its line.
//! 3. **Score** streams the target file through a small parse pool into a
//!    scoring pool that dots every target document against every loaded
//!    ref and reports pairs clearing the threshold to the [`ScoreSink`].
//!
//! Workers communicate over bounded queues; `None` is the poison value, one
//! per worker. A failed worker keeps draining its queue so producers never
//! stall, and the first error wins once everything has joined.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::OnceLock;
use std::thread;

use crate::config;
use crate::df::{self, DfBuilder, DfTable};
use crate::document::{calculate_alignment, calculate_tfidf, read_document, DocumentRef};
use crate::error::{Error, Result};
use crate::queue::BoundedQueue;

pub mod sink;

pub use sink::{best_pairs, write_score, ScoreSink, ScoredPair};

/// Pipeline configuration. Defaults mirror the CLI defaults in
/// [`crate::config`].
#[derive(Debug, Clone)]
pub struct AlignOptions {
    /// N-gram window size in tokens.
    pub ngram_size: usize,
    /// Build DF from every n-th document.
    pub df_sample_rate: usize,
    /// Inclusive lower DF bound.
    pub min_count: usize,
    /// Inclusive upper DF bound.
    pub max_count: usize,
    /// Minimum score for a pair to be reported.
    pub threshold: f32,
    /// Worker threads per pool.
    pub jobs: usize,
    /// Conflict-free best matching instead of printing all pairs.
    pub best: bool,
}

impl Default for AlignOptions {
    fn default() -> Self {
        AlignOptions {
            ngram_size: config::DEFAULT_NGRAM_SIZE,
            df_sample_rate: config::DEFAULT_DF_SAMPLE_RATE,
            min_count: config::DEFAULT_MIN_COUNT,
            max_count: config::DEFAULT_MAX_COUNT,
            threshold: config::DEFAULT_THRESHOLD,
            jobs: thread::available_parallelism().map_or(1, |n| n.get()),
            best: true,
        }
    }
}

/// Counters reported back to the caller (and to stderr under `--verbose`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlignStats {
    /// Lines in the translated input.
    pub translated_documents: usize,
    /// Lines in the target input.
    pub english_documents: usize,
    /// DF entries surviving the prune.
    pub df_terms: usize,
    /// Pairs written to the output.
    pub pairs_emitted: usize,
}

/// One line of input on its way to a worker.
struct Line {
    /// 1-based line number, which doubles as the document id.
    n: usize,
    text: String,
}

/// Feed every `skip_rate`-th line of `path` into `queue`. Returns the total
/// number of lines in the file, including skipped ones.
fn queue_lines(path: &Path, queue: &BoundedQueue<Option<Line>>, skip_rate: usize) -> Result<usize> {
    let file = File::open(path).map_err(|source| Error::OpenInput {
        path: path.to_path_buf(),
        source,
    })?;

    let mut count = 0usize;
    for line in BufReader::new(file).lines() {
        let text = line?;
        count += 1;
        if (count - 1) % skip_rate != 0 {
            continue;
        }
        queue.push(Some(Line { n: count, text }));
    }
    Ok(count)
}

/// Join worker handles, keeping the first error (a panic beats nothing but
/// not an earlier, more descriptive failure).
fn join_workers(handles: Vec<thread::ScopedJoinHandle<'_, Result<()>>>) -> Result<()> {
    let mut first_error = None;
    for handle in handles {
        let outcome = match handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::WorkerPanic),
        };
        if let Err(e) = outcome {
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Run the full pipeline, writing score lines to `out`.
pub fn align<W: Write + Send>(
    options: &AlignOptions,
    translated_path: &Path,
    english_path: &Path,
    out: W,
) -> Result<AlignStats> {
    let jobs = options.jobs.max(1);
    let sample_rate = options.df_sample_rate.max(1);

    // ── Phase 1: sample both files into the DF table ────────────────────
    let builder = DfBuilder::new(sample_rate);
    let (english_documents, translated_documents) = {
        let queue: BoundedQueue<Option<Line>> =
            BoundedQueue::new(jobs * config::LINE_QUEUE_PER_WORKER);

        thread::scope(|scope| -> Result<(usize, usize)> {
            let workers: Vec<_> = (0..jobs)
                .map(|_| {
                    scope.spawn(|| -> Result<()> {
                        let mut local = DfTable::new();
                        let mut failure = None;
                        while let Some(line) = queue.pop() {
                            if failure.is_some() {
                                continue; // keep draining so the producer never stalls
                            }
                            match read_document(&line.text, line.n, options.ngram_size) {
                                Ok(document) => DfBuilder::count_document(&mut local, &document),
                                Err(e) => failure = Some(e),
                            }
                        }
                        if let Some(e) = failure {
                            return Err(e);
                        }
                        builder.merge(local);
                        Ok(())
                    })
                })
                .collect();

            let produced: Result<(usize, usize)> = (|| {
                let english = queue_lines(english_path, &queue, sample_rate)?;
                let translated = queue_lines(translated_path, &queue, sample_rate)?;
                Ok((english, translated))
            })();

            for _ in 0..jobs {
                queue.push(None);
            }
            join_workers(workers)?;
            let counts = produced?;

            let stats = queue.stats();
            tracing::info!(
                overflow = stats.overflow,
                underflow = stats.underflow,
                "sample queue performance"
            );
            Ok(counts)
        })?
    };

    let document_count = translated_documents + english_documents;
    tracing::info!(
        documents = document_count / sample_rate,
        "calculated DF table"
    );

    let mut df = builder.into_table();
    let total_terms = df.len();
    let dropped = df::prune(&mut df, options.min_count, options.max_count);
    tracing::info!(
        dropped,
        kept = df.len(),
        percent = (100.0 * dropped as f64 / total_terms.max(1) as f64) as u32,
        "pruned DF table"
    );

    // ── Phase 2: load the translated side into memory ───────────────────
    let ref_slots: Vec<OnceLock<DocumentRef>> =
        (0..translated_documents).map(|_| OnceLock::new()).collect();
    {
        let queue: BoundedQueue<Option<Line>> =
            BoundedQueue::new(jobs * config::LINE_QUEUE_PER_WORKER);

        thread::scope(|scope| -> Result<()> {
            let workers: Vec<_> = (0..jobs)
                .map(|_| {
                    scope.spawn(|| -> Result<()> {
                        let mut failure = None;
                        while let Some(line) = queue.pop() {
                            if failure.is_some() {
                                continue;
                            }
                            failure = load_ref(
                                &line,
                                &ref_slots,
                                document_count,
                                &df,
                                options.ngram_size,
                            )
                            .err();
                        }
                        match failure {
                            Some(e) => Err(e),
                            None => Ok(()),
                        }
                    })
                })
                .collect();

            let produced = queue_lines(translated_path, &queue, 1).map(|_| ());
            for _ in 0..jobs {
                queue.push(None);
            }
            join_workers(workers)?;
            produced?;

            let stats = queue.stats();
            tracing::info!(
                overflow = stats.overflow,
                underflow = stats.underflow,
                "load queue performance"
            );
            Ok(())
        })?
    };

    let refs = ref_slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.into_inner().ok_or(Error::InputChanged {
                line: i + 1,
                expected: translated_documents,
            })
        })
        .collect::<Result<Vec<DocumentRef>>>()?;
    tracing::info!(documents = refs.len(), "read translated documents into memory");

    // ── Phase 3: stream the target side and score ───────────────────────
    // Best-pairs mode keeps the writer aside for the matching pass.
    let (sink, mut kept_out) = if options.best {
        (ScoreSink::best_pairs(), Some(out))
    } else {
        (ScoreSink::all_pairs(out), None)
    };

    let read_jobs = jobs.min((jobs / 4).clamp(1, config::MAX_READ_THREADS));
    {
        let read_queue: BoundedQueue<Option<Line>> =
            BoundedQueue::new(read_jobs * config::LINE_QUEUE_PER_WORKER);
        let score_queue: BoundedQueue<Option<DocumentRef>> =
            BoundedQueue::new(jobs * config::SCORE_QUEUE_PER_WORKER);

        thread::scope(|scope| -> Result<()> {
            let readers: Vec<_> = (0..read_jobs)
                .map(|_| {
                    scope.spawn(|| -> Result<()> {
                        let mut failure = None;
                        while let Some(line) = read_queue.pop() {
                            if failure.is_some() {
                                continue;
                            }
                            match read_document(&line.text, line.n, options.ngram_size) {
                                Ok(document) => score_queue
                                    .push(Some(calculate_tfidf(&document, document_count, &df))),
                                Err(e) => failure = Some(e),
                            }
                        }
                        match failure {
                            Some(e) => Err(e),
                            None => Ok(()),
                        }
                    })
                })
                .collect();

            let scorers: Vec<_> = (0..jobs)
                .map(|_| {
                    scope.spawn(|| -> Result<()> {
                        let mut failure = None;
                        while let Some(target) = score_queue.pop() {
                            if failure.is_some() {
                                continue;
                            }
                            for reference in &refs {
                                let score = calculate_alignment(reference, &target);
                                if score < options.threshold {
                                    continue;
                                }
                                if let Err(e) = sink.record(score, reference.id, target.id) {
                                    failure = Some(e);
                                    break;
                                }
                            }
                        }
                        match failure {
                            Some(e) => Err(e),
                            None => Ok(()),
                        }
                    })
                })
                .collect();

            let produced = queue_lines(english_path, &read_queue, 1).map(|_| ());

            // Readers stop first; only then is it safe to poison the score
            // queue, because readers are its producers.
            for _ in 0..read_jobs {
                read_queue.push(None);
            }
            let read_result = join_workers(readers);
            for _ in 0..jobs {
                score_queue.push(None);
            }
            let score_result = join_workers(scorers);

            produced?;
            read_result?;
            score_result?;

            let read_stats = read_queue.stats();
            let score_stats = score_queue.stats();
            tracing::info!(
                overflow = read_stats.overflow,
                underflow = read_stats.underflow,
                "read queue performance (blocks when the score queue fills up)"
            );
            tracing::info!(
                overflow = score_stats.overflow,
                underflow = score_stats.underflow,
                "score queue performance"
            );
            Ok(())
        })?
    };

    // ── Emit ────────────────────────────────────────────────────────────
    let pairs_emitted = match sink {
        ScoreSink::AllPairs { out, emitted } => {
            let mut out = out.into_inner();
            out.flush()?;
            emitted.into_inner()
        }
        ScoreSink::BestPairs { pairs } => {
            let limit = translated_documents.min(english_documents);
            let selected = best_pairs(pairs.into_inner(), limit);
            let out = kept_out
                .as_mut()
                .expect("writer is kept aside in best-pairs mode");
            for pair in &selected {
                write_score(out, pair)?;
            }
            out.flush()?;
            selected.len()
        }
    };

    Ok(AlignStats {
        translated_documents,
        english_documents,
        df_terms: df.len(),
        pairs_emitted,
    })
}

/// Parse, weight, and park one translated line in its slot. Each line id
/// owns exactly one slot; a second write or an out-of-range id means the
/// file changed between the sample and load passes.
fn load_ref(
    line: &Line,
    slots: &[OnceLock<DocumentRef>],
    document_count: usize,
    df: &DfTable,
    ngram_size: usize,
) -> Result<()> {
    let document = read_document(&line.text, line.n, ngram_size)?;
    let reference = calculate_tfidf(&document, document_count, df);

    let changed = || Error::InputChanged {
        line: line.n,
        expected: slots.len(),
    };
    let slot = slots.get(line.n - 1).ok_or_else(changed)?;
    slot.set(reference).map_err(|_| changed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    fn write_corpus(documents: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for text in documents {
            writeln!(file, "{}", STANDARD.encode(text)).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn options(best: bool) -> AlignOptions {
        AlignOptions {
            ngram_size: 1,
            min_count: 1,
            max_count: 1000,
            threshold: 0.1,
            jobs: 2,
            best,
            ..AlignOptions::default()
        }
    }

    fn run(options: &AlignOptions, translated: &[&str], english: &[&str]) -> (AlignStats, String) {
        let translated = write_corpus(translated);
        let english = write_corpus(english);
        let mut out = Vec::new();
        let stats = align(options, translated.path(), english.path(), &mut out).unwrap();
        (stats, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_identical_single_documents_align_perfectly() {
        let mut opts = options(true);
        opts.threshold = 0.0;
        opts.min_count = 1;
        opts.max_count = 10;
        let (stats, output) = run(&opts, &["hello world"], &["hello world"]);
        assert_eq!(stats.translated_documents, 1);
        assert_eq!(stats.english_documents, 1);
        assert_eq!(output, "1.00000\t1\t1\n");
    }

    #[test]
    fn test_best_mode_emits_conflict_free_matching() {
        // Two near-identical pairs, crossed: best matching pairs each
        // translated document with its twin.
        let translated = ["aa bb cc dd", "ee ff gg hh"];
        let english = ["ee ff gg hh", "aa bb cc dd"];
        let (stats, output) = run(&options(true), &translated, &english);
        assert_eq!(stats.pairs_emitted, 2);
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines.contains(&"1.00000\t1\t2"));
        assert!(lines.contains(&"1.00000\t2\t1"));
    }

    #[test]
    fn test_all_mode_reports_every_pair_above_threshold() {
        let translated = ["aa bb", "aa bb"];
        let english = ["aa bb"];
        let (stats, output) = run(&options(false), &translated, &english);
        // Both translated documents clear the threshold against the single
        // english one.
        assert_eq!(stats.pairs_emitted, 2);
        for line in output.lines() {
            assert!(line.starts_with("1.00000\t"));
        }
    }

    #[test]
    fn test_disjoint_corpora_emit_nothing() {
        let (stats, output) = run(&options(true), &["aa bb"], &["cc dd"]);
        assert_eq!(stats.pairs_emitted, 0);
        assert!(output.is_empty());
    }

    #[test]
    fn test_missing_input_file_is_an_open_error() {
        let english = write_corpus(&["aa"]);
        let mut out = Vec::new();
        let err = align(
            &options(true),
            Path::new("/nonexistent/docalign-input"),
            english.path(),
            &mut out,
        )
        .unwrap_err();
        assert!(matches!(err, Error::OpenInput { .. }));
    }

    #[test]
    fn test_malformed_base64_propagates_line_number() {
        let translated = write_corpus(&["aa bb"]);
        let mut english = tempfile::NamedTempFile::new().unwrap();
        writeln!(english, "{}", STANDARD.encode("aa bb")).unwrap();
        writeln!(english, "@@not-base64@@").unwrap();
        english.flush().unwrap();

        let mut out = Vec::new();
        let err = align(&options(true), translated.path(), english.path(), &mut out).unwrap_err();
        assert!(matches!(err, Error::Base64 { line: 2, .. }));
    }
}
