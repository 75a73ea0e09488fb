mod config;

use std::path::PathBuf;
use std::process;

use structopt::StructOpt;

use butd_vqa::dataset::{DataLoader, SplitPaths, VQADataset};
use butd_vqa::eval::{answer_from_scores, batch_accuracy, Prediction};
use butd_vqa::utils::{expand_path, read_json, write_json};
use butd_vqa::{Resources, Result, VQAError};

use crate::config::ButdConfig;

#[derive(StructOpt, Debug, Clone)]
#[structopt(about = "Bottom-up/top-down VQA inference")]
pub struct Opts {
    #[structopt(short, long, parse(from_os_str))]
    pub config: PathBuf,

    /// Predictions file, overrides `predictions_path` from the config
    #[structopt(short, long, parse(from_os_str))]
    pub output: Option<PathBuf>,

    /// Number of loader threads, overrides the config
    #[structopt(short = "j", long)]
    pub num_workers: Option<usize>,
}

// cargo run --bin butd -- -c [CONFIG_PATH] [-o PREDICTIONS_PATH]
fn main() {
    env_logger::init();
    let opt = Opts::from_args();
    if let Err(e) = run(opt) {
        log::error!("{}", e);
        process::exit(1);
    }
}

fn run(opt: Opts) -> Result<()> {
    let mut config: ButdConfig = read_json(expand_path(&opt.config))?;
    if let Some(num_workers) = opt.num_workers {
        config.loader.num_workers = num_workers;
    }
    let output = opt.output.or(config.predictions_path).map(expand_path);

    let resources = Resources::new(config.resources)?;
    let features = resources
        .features
        .clone()
        .ok_or_else(|| VQAError::Config("features_path is required for inference".to_string()))?;
    let net = resources
        .model
        .as_ref()
        .ok_or_else(|| VQAError::Config("load_model is required for inference".to_string()))?;

    let paths = SplitPaths {
        questions: expand_path(&config.split.questions),
        answers: config.split.answers.as_ref().map(expand_path),
        adversarial_questions: config.split.adversarial_questions.as_ref().map(expand_path),
    };
    let dataset = VQADataset::new(&paths, features, resources.vocab.clone(), config.dataset)?;
    let loader = DataLoader::new(&dataset, config.loader)?;
    log::info!("running inference on {} questions in {} batches", dataset.len(), loader.num_batches());

    let mut predictions = Vec::with_capacity(dataset.len());
    let mut accuracy = 0.;
    for (i, batch) in loader.iter().enumerate() {
        let batch = batch?;
        let scores = net.forward_batch(&batch, None)?;
        if let Some(counts) = &batch.a {
            accuracy += batch_accuracy(&scores.view(), &counts.view());
        }
        let answers = answer_from_scores(&scores.view(), &resources.vocab);
        for (&question_id, answer) in batch.question_ids.iter().zip(answers) {
            predictions.push(Prediction {
                question_id,
                answer: answer.unwrap_or_default(),
            });
        }
        log::debug!("batch {} done, {} predictions", i, predictions.len());
    }

    if dataset.has_answers() && !predictions.is_empty() {
        log::info!("accuracy: {:.4}", accuracy / predictions.len() as f32);
    }
    if let Some(output) = output {
        write_json(&output, &predictions)?;
        log::info!("wrote {} predictions to {}", predictions.len(), output.display());
    }
    Ok(())
}
