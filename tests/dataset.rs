mod common;

use float_cmp::approx_eq;
use ndarray::{arr1, Array1};

use butd_vqa::dataset::{
    collate, encode_answers, encode_question, prepare_answers, prepare_question, process_punctuation, DataLoader,
    DatasetConfig, LoaderConfig, VQADataset,
};
use butd_vqa::utils::{check_integrity, read_annotations, read_questions};
use butd_vqa::VQAError;

use common::Fixture;

fn tokens(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

#[test]
fn test_prepare_question() {
    assert_eq!(prepare_question("Is the sky blue?"), tokens(&["is", "the", "sky", "blue"]));
    assert_eq!(prepare_question("What's on the man's head?"), tokens(&["whats", "on", "the", "mans", "head"]));
    // the last character goes even when it is not a question mark
    assert_eq!(prepare_question("How many"), tokens(&["how", "man"]));
    assert_eq!(prepare_question("Is it blue ?"), tokens(&["is", "it", "blue", ""]));
}

#[test]
fn test_encode_question() {
    let fixture = Fixture::new();
    let vocab = fixture.vocab();

    let q = encode_question(&prepare_question("Is the sky blue?"), &vocab, 14);
    assert_eq!(q.len, 4);
    assert_eq!(q.indices.len(), 14);
    assert_eq!(q.indices.slice(ndarray::s![..4]).to_vec(), vec![0, 1, 2, 3]);
    assert!(q.indices.iter().skip(4).all(|&i| i == vocab.pad_index()));
    assert_eq!(q.mask().sum(), 4.);

    // unknown tokens map to the last vocabulary slot
    let q = encode_question(&tokens(&["is", "it"]), &vocab, 3);
    assert_eq!(q.indices, arr1(&[0usize, 6, 7]));
    assert_eq!(vocab.oov_index(), 6);
    assert_eq!(vocab.pad_index(), 7);
}

#[test]
fn test_encode_question_truncates() {
    let fixture = Fixture::new();
    let vocab = fixture.vocab();
    let long = (0..20).map(|i| if i % 2 == 0 { "sky" } else { "unseen" }.to_string()).collect::<Vec<_>>();

    let q = encode_question(&long, &vocab, 14);
    assert_eq!(q.len, 14);
    assert_eq!(q.indices.len(), 14);
    assert!(q.indices.iter().all(|&i| i <= vocab.num_tokens()));
    assert!(q.indices.iter().all(|&i| i != vocab.pad_index()));
}

#[test]
fn test_process_punctuation() {
    assert_eq!(process_punctuation("1,234"), "1234");
    assert_eq!(process_punctuation("don't"), "dont");
    assert_eq!(process_punctuation("yes"), "yes");
    assert_eq!(process_punctuation("red, white"), "red white");
    assert_eq!(process_punctuation("t-shirt"), "t shirt");
    assert_eq!(process_punctuation("3.5"), "3.5");
    assert_eq!(process_punctuation("ok.!"), "ok");
    // periods alone do not trigger normalization
    assert_eq!(process_punctuation("no."), "no.");

    for answer in ["don't", "1,234", "t-shirt!", "a.b", "(left)", "hello ; world"] {
        let once = process_punctuation(answer);
        assert_eq!(process_punctuation(&once), once, "not idempotent on {:?}", answer);
    }
}

#[test]
fn test_encode_answers() {
    let fixture = Fixture::new();
    let vocab = fixture.vocab();

    let a = encode_answers(&tokens(&["yes", "yes", "no"]), &vocab);
    assert_eq!(a.len(), 10);
    assert_eq!(a[3], 2.);
    assert_eq!(a[7], 1.);
    assert_eq!(a.sum(), 3.);

    let a = encode_answers(&prepare_answers(&tokens(&["don't", "maybe"])), &vocab);
    assert_eq!(a[9], 1.);
    assert_eq!(a.sum(), 1.);
}

#[test]
fn test_integrity_check() {
    let fixture = Fixture::new();
    let questions = read_questions(fixture.path("questions.json")).unwrap();
    let answers = read_annotations(fixture.path("annotations.json")).unwrap();
    assert!(check_integrity(&questions, &answers).is_ok());

    let mut shuffled = answers.clone();
    shuffled.annotations.swap(0, 1);
    assert!(matches!(check_integrity(&questions, &shuffled), Err(VQAError::Integrity(_))));

    let mut wrong_image = answers.clone();
    wrong_image.annotations[2].image_id = 99;
    assert!(matches!(check_integrity(&questions, &wrong_image), Err(VQAError::Integrity(_))));

    let mut wrong_subtype = answers;
    wrong_subtype.data_subtype = Some("train2014".to_string());
    let result = VQADataset::from_records(
        questions,
        Some(wrong_subtype),
        None,
        fixture.index(),
        fixture.vocab(),
        DatasetConfig::default(),
    );
    assert!(matches!(result, Err(VQAError::Integrity(_))));
}

#[test]
fn test_dataset_samples() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset(DatasetConfig::default());
    assert_eq!(dataset.len(), 4);
    assert_eq!(dataset.max_question_length(), 5);
    assert!(dataset.has_answers());

    let sample = dataset.get(1).unwrap();
    assert_eq!(sample.question_id, 101);
    assert_eq!(sample.image_id, 20);
    assert_eq!(sample.q.indices, arr1(&[4usize, 5, 0, 1, 2]));
    assert_eq!(sample.q.len, 5);
    assert_eq!(sample.a.as_ref().unwrap().sum(), 0.);

    let sample = dataset.get(2).unwrap();
    assert_eq!(sample.v.dim(), (common::OBJECTS, common::DIM));
    assert_eq!(sample.b.dim(), (common::OBJECTS, 4));
    assert_eq!(sample.v_mask, arr1(&[1f32, 1., 0.]));
    assert!(approx_eq!(f32, sample.v[[1, 3]], 2.4, epsilon = 1e-5));
    assert_eq!(sample.q_mask, arr1(&[1f32, 1., 0., 0., 0.]));
    assert_eq!(sample.a.as_ref().unwrap()[9], 1.);

    let a = dataset.get(0).unwrap().a.unwrap();
    assert_eq!(a[3], 2.);
    assert_eq!(a[7], 1.);
    assert!(a.iter().all(|&c| c >= 0. && c.fract() == 0.));

    assert!(dataset.get(4).is_err());
}

#[test]
fn test_box_normalization() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset(DatasetConfig::default());
    for i in 0..dataset.len() {
        let sample = dataset.get(i).unwrap();
        assert!(sample.b.iter().all(|&x| (0. ..=1.).contains(&x)));
    }

    let raw = fixture.dataset(DatasetConfig {
        normalize_box: false,
        ..DatasetConfig::default()
    });
    let sample = raw.get(0).unwrap();
    // image 10 is 100 x 80, last object's (x2, y2) sits at 3/4 of the extent
    assert!(approx_eq!(f32, sample.b[[2, 2]], 75., epsilon = 1e-4));
    assert!(approx_eq!(f32, sample.b[[2, 3]], 60., epsilon = 1e-4));

    let normalized = dataset.get(0).unwrap();
    assert!(approx_eq!(f32, normalized.b[[2, 2]], 0.75, epsilon = 1e-6));
    assert!(approx_eq!(f32, normalized.b[[2, 3]], 0.75, epsilon = 1e-6));
}

#[test]
fn test_answerable_filter() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset(DatasetConfig {
        answerable_only: true,
        ..DatasetConfig::default()
    });
    assert_eq!(dataset.len(), 3);
    let ids = (0..dataset.len())
        .map(|i| dataset.get(i).unwrap().question_id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![100, 102, 103]);

    let half = fixture.dataset(DatasetConfig {
        answerable_only: true,
        frac: 0.5,
        ..DatasetConfig::default()
    });
    assert_eq!(half.len(), 1);
    assert_eq!(half.get(0).unwrap().question_id, 100);
}

#[test]
fn test_unknown_image() {
    let fixture = Fixture::new();
    let mut questions = read_questions(fixture.path("questions.json")).unwrap();
    questions.questions[0].image_id = 99;
    let dataset = VQADataset::from_records(
        questions,
        None,
        None,
        fixture.index(),
        fixture.vocab(),
        DatasetConfig::default(),
    )
    .unwrap();
    assert!(!dataset.has_answers());
    assert!(matches!(dataset.get(0), Err(VQAError::UnknownImage(99))));
    assert!(dataset.get(1).unwrap().a.is_none());
}

#[test]
fn test_lazy_feature_handle() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset(DatasetConfig::default());
    assert!(!dataset.features().is_open());

    dataset.get(0).unwrap();
    assert!(dataset.features().is_open());

    let worker_view = dataset.fork();
    assert!(!worker_view.features().is_open());
    assert_eq!(worker_view.len(), dataset.len());
}

#[test]
fn test_collate_sorts_by_length() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset(DatasetConfig::default());
    let samples = (0..dataset.len()).map(|i| dataset.get(i).unwrap()).collect::<Vec<_>>();

    let batch = collate(samples).unwrap();
    assert_eq!(batch.len(), 4);
    assert_eq!(batch.q_len, vec![5, 4, 2, 1]);
    assert_eq!(batch.items, vec![1, 0, 2, 3]);
    assert_eq!(batch.question_ids, vec![101, 100, 102, 103]);
    assert_eq!(batch.v.dim(), (4, common::OBJECTS, common::DIM));
    assert_eq!(batch.q.dim(), (4, 5));
    assert_eq!(batch.a.as_ref().unwrap().dim(), (4, 10));
    assert!(batch.q_adv.is_none());

    assert!(collate(Vec::new()).is_err());
}

#[test]
fn test_loader_with_workers() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset(DatasetConfig::default());

    let config = LoaderConfig {
        batch_size: 2,
        num_workers: 2,
        ..LoaderConfig::default()
    };
    let loader = DataLoader::new(&dataset, config.clone()).unwrap();
    assert_eq!(loader.num_batches(), 2);
    let threaded = loader.iter().map(|b| b.unwrap().items).collect::<Vec<_>>();
    assert_eq!(threaded, vec![vec![1, 0], vec![2, 3]]);

    let inline = DataLoader::new(&dataset, LoaderConfig { num_workers: 0, ..config })
        .unwrap()
        .iter()
        .map(|b| b.unwrap().items)
        .collect::<Vec<_>>();
    assert_eq!(inline, threaded);
}

#[test]
fn test_loader_shuffle_covers_every_item() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset(DatasetConfig::default());
    let loader = DataLoader::new(
        &dataset,
        LoaderConfig {
            batch_size: 3,
            num_workers: 3,
            shuffle: true,
            seed: Some(7),
            ..LoaderConfig::default()
        },
    )
    .unwrap();

    let mut items = loader.iter().flat_map(|b| b.unwrap().items).collect::<Vec<_>>();
    items.sort_unstable();
    assert_eq!(items, vec![0, 1, 2, 3]);

    // dropping a partly consumed iterator joins its workers
    let mut iter = loader.iter();
    assert!(iter.next().unwrap().is_ok());
    drop(iter);
}

#[test]
fn test_loader_reports_errors() {
    let fixture = Fixture::new();
    let mut questions = read_questions(fixture.path("questions.json")).unwrap();
    questions.questions[3].image_id = 99;
    let dataset = VQADataset::from_records(
        questions,
        None,
        None,
        fixture.index(),
        fixture.vocab(),
        DatasetConfig::default(),
    )
    .unwrap();
    let loader = DataLoader::new(
        &dataset,
        LoaderConfig {
            batch_size: 2,
            num_workers: 2,
            ..LoaderConfig::default()
        },
    )
    .unwrap();
    let results = loader.iter().collect::<Vec<_>>();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(VQAError::UnknownImage(99))));
}

#[test]
fn test_adversarial_questions() {
    let fixture = Fixture::new();
    let questions = read_questions(fixture.path("questions.json")).unwrap();
    let mut adversarial = questions.clone();
    adversarial.questions[0].question = "Is the sky the color blue?".to_string();
    let dataset = VQADataset::from_records(
        questions,
        None,
        Some(adversarial),
        fixture.index(),
        fixture.vocab(),
        DatasetConfig::default(),
    )
    .unwrap();

    let sample = dataset.get(0).unwrap();
    let adv = sample.q_adv.unwrap();
    // encoded with the original questions' length
    assert_eq!(adv.indices.len(), 5);
    assert_eq!(adv.len, 5);
    assert_eq!(adv.indices, Array1::from(vec![0usize, 1, 2, 1, 5]));
}

#[test]
fn test_loader_bounds_prefetch() {
    let fixture = Fixture::new();
    let mut questions = read_questions(fixture.path("questions.json")).unwrap();
    let records = questions.questions.clone();
    questions.questions = (0..200)
        .map(|i| {
            let mut q = records[i % records.len()].clone();
            q.question_id = i as i64;
            q
        })
        .collect();
    let dataset = VQADataset::from_records(
        questions,
        None,
        None,
        fixture.index(),
        fixture.vocab(),
        DatasetConfig::default(),
    )
    .unwrap();
    let config = LoaderConfig {
        batch_size: 1,
        num_workers: 2,
        ..LoaderConfig::default()
    };
    let window = config.num_workers * config.prefetch_factor;
    let loader = DataLoader::new(&dataset, config).unwrap();

    let mut iter = loader.iter();
    assert!(iter.next().unwrap().is_ok());
    // a slow consumer: the workers run ahead only as far as the window allows
    std::thread::sleep(std::time::Duration::from_millis(300));
    assert!(iter.in_flight() <= window);
    assert!(iter.buffered() <= window);

    let rest = iter.map(|b| b.unwrap().question_ids).collect::<Vec<_>>();
    assert_eq!(rest.len(), 199);
    assert_eq!(rest[0], vec![1]);
    assert_eq!(rest[198], vec![199]);
}

#[test]
fn test_malformed_boxes() {
    let fixture = Fixture::new();
    // boxes with three coordinates per object
    let boxes = ndarray::Array3::<f32>::ones((common::IMAGE_IDS.len(), 3, common::OBJECTS));
    ndarray_npy::write_npy(fixture.features_root().join("boxes.npy"), &boxes).unwrap();

    let dataset = fixture.dataset(DatasetConfig::default());
    assert!(matches!(dataset.get(0), Err(VQAError::ShapeMismatch { .. })));

    // and with an object count that disagrees with the features
    let boxes = ndarray::Array3::<f32>::ones((common::IMAGE_IDS.len(), 4, common::OBJECTS + 1));
    ndarray_npy::write_npy(fixture.features_root().join("boxes.npy"), &boxes).unwrap();
    let dataset = fixture.dataset(DatasetConfig::default());
    assert!(matches!(dataset.get(0), Err(VQAError::ShapeMismatch { .. })));
}
