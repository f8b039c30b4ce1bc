//! Tags a corpus with a trained model, optionally scoring it against gold
//! labels (`--test`) or printing per-position marginals (`--marginal`).

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;

use clap::Parser;
use log::info;

use crf1d::corpus;
use crf1d::eval::Evaluation;
use crf1d::{Model, Tagger};

#[derive(Parser)]
#[command(name = "crf-tag", about = "Tags a corpus with a trained CRF model")]
struct Cli {
    #[arg(short = 'm', long)]
    model: PathBuf,

    input: PathBuf,

    /// Score predictions against the corpus's own gold labels.
    #[arg(short = 't', long)]
    test: bool,

    /// Print the normalized probability of the predicted sequence.
    #[arg(short = 'p', long)]
    probability: bool,

    /// Print the per-position marginal probability of every label.
    #[arg(long)]
    marginal: bool,

    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> crf1d::Result<()> {
    let cli = Cli::parse();
    crf1d::init_logging(cli.log_file.as_deref());

    let model = Model::load(&cli.model)?;
    let mut labels = model.labels.clone();
    let mut attrs = model.attrs.clone();

    let reader = BufReader::new(File::open(&cli.input)?);
    let dataset = corpus::parse_dataset(reader, 0, &mut labels, &mut attrs)?;
    info!("read {} instances from {}", dataset.len(), cli.input.display());

    let mut tagger = Tagger::new(model);
    let mut eval = cli.test.then(|| Evaluation::new(tagger.model().num_labels()));
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for inst in dataset.iter() {
        let (predicted, probability) = if cli.probability {
            tagger.tag_with_probability(inst)
        } else {
            tagger.tag(inst)
        };

        let marginals = cli.marginal.then(|| tagger.marginals(inst));

        for (t, &label) in predicted.iter().enumerate() {
            let name = labels.string_of(label as u32).unwrap_or("?");
            write!(out, "{name}")?;
            if let Some(m) = &marginals {
                write!(out, ":{:.6}", m[t][label])?;
            }
            writeln!(out)?;
        }
        if cli.probability {
            writeln!(out, "@probability\t{probability:.6}")?;
        }
        writeln!(out)?;

        if let Some(eval) = eval.as_mut() {
            let gold: Vec<usize> = inst.labels.iter().map(|&l| l as usize).collect();
            eval.accumulate(&gold, &predicted);
        }
    }

    if let Some(eval) = eval {
        info!(
            "item accuracy {:.4}, instance accuracy {:.4}, macro F1 {:.4}",
            eval.item_accuracy(),
            eval.instance_accuracy(),
            eval.macro_f1()
        );
    }

    Ok(())
}
