use super::{Context, log_stats};
use crate::classifier::metrics::{self, Evaluation};
use crate::classifier::{self, TextClassifier, dataset};
use crate::models::{PendingArticle, Prediction, VerifiedLabel};
use crate::utils::{ensure_parent_dir, preview};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

#[instrument(level = "info", skip_all)]
pub async fn train(
    ctx: &Context,
    balance: bool,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let mut config = ctx.config.classifier.clone();
    config.balance_classes |= balance;
    let model_path = output.unwrap_or_else(|| config.model_path.clone());

    let store = ctx.open_store().await?;
    let samples = dataset::from_labeled(store.labeled_texts().await?);
    if samples.is_empty() {
        error!("No labeled articles in the store; run `label` first");
        return Err("no labeled articles to train on".into());
    }

    let (model, report) = match classifier::train(samples, &config) {
        Ok(trained) => trained,
        Err(e) => {
            error!(error = %e, "Training failed");
            return Err(e.into());
        }
    };

    info!(
        train = report.train_size,
        test = report.test_size,
        "Model trained"
    );
    report.evaluation.log();
    report.diagnosis.log();

    ensure_parent_dir(&model_path)?;
    model.save(&model_path)?;
    info!(path = %model_path.display(), version = model.version(), "Model saved");
    Ok(())
}

/// Score every pending article with `model`.
pub fn score(model: &TextClassifier, articles: &[PendingArticle]) -> Vec<Prediction> {
    articles
        .iter()
        .map(|article| {
            let (predicted_label, confidence) = model.predict(&article.text);
            Prediction {
                article_id: article.id,
                model_version: model.version().to_string(),
                predicted_label,
                confidence,
            }
        })
        .collect()
}

fn load_model(ctx: &Context, model_path: Option<PathBuf>) -> Result<TextClassifier, Box<dyn Error>> {
    let model_path = model_path.unwrap_or_else(|| ctx.config.classifier.model_path.clone());
    match TextClassifier::load(&model_path) {
        Ok(model) => Ok(model),
        Err(e) => {
            error!(error = %e, "Cannot load classifier");
            Err(e.into())
        }
    }
}

#[instrument(level = "info", skip_all)]
pub async fn predict(ctx: &Context, model_path: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let model = load_model(ctx, model_path)?;

    let store = ctx.open_store().await?;
    let pending = store.pending_articles().await?;
    if pending.is_empty() {
        info!("No pending articles to score");
        return Ok(());
    }
    info!(count = pending.len(), "Scoring pending articles");

    let predictions = score(&model, &pending);

    for (article, prediction) in pending
        .iter()
        .zip(&predictions)
        .take(ctx.config.classifier.preview_rows)
    {
        info!(
            id = article.id,
            source = %article.source,
            label = %prediction.predicted_label,
            confidence = %format!("{:.1}%", prediction.confidence * 100.0),
            title = %preview(&article.title, 45),
            "Prediction"
        );
    }

    let fake = predictions
        .iter()
        .filter(|p| p.predicted_label == VerifiedLabel::Fake)
        .count();
    if fake > 0 {
        warn!(fake, total = predictions.len(), "Articles flagged as FAKE");
    } else {
        info!(total = predictions.len(), "No article flagged as FAKE");
    }

    if let Err(e) = store.save_predictions(&predictions).await {
        error!(error = %e, "Saving predictions failed; no article was marked processed");
        return Err(e.into());
    }
    info!(count = predictions.len(), "Predictions saved");
    log_stats(&store).await
}

/// Score a held-out labeled set, logging one line per row, and evaluate.
pub fn check_samples(model: &TextClassifier, samples: &[dataset::Sample]) -> Evaluation {
    let mut truth = Vec::with_capacity(samples.len());
    let mut predicted = Vec::with_capacity(samples.len());
    for sample in samples {
        let (label, confidence) = model.predict(&sample.text);
        info!(
            hit = label == sample.label,
            predicted = %label,
            confidence = %format!("{:.1}%", confidence * 100.0),
            truth = %sample.label,
            text = %preview(&sample.text, 40),
            "Validation row"
        );
        truth.push(sample.label);
        predicted.push(label);
    }
    metrics::evaluate(&truth, &predicted)
}

/// Evaluate a saved model on texts it was never trained on.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn validate(
    ctx: &Context,
    input: &Path,
    model_path: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let model = load_model(ctx, model_path)?;
    let samples = match dataset::load_validation_set(input) {
        Ok(samples) => samples,
        Err(e) => {
            error!(error = %e, "Cannot read validation set");
            return Err(e.into());
        }
    };
    if samples.is_empty() {
        error!("Validation set has no rows");
        return Err("empty validation set".into());
    }
    info!(rows = samples.len(), version = model.version(), "Predicting on validation set");

    let evaluation = check_samples(&model, &samples);
    evaluation.log();

    let c = &evaluation.confusion;
    info!(tp = c.true_fake, of = evaluation.fake.support, "FAKE rows caught");
    info!(tn = c.true_real, of = evaluation.real.support, "REAL rows kept");
    if c.false_real + c.false_fake > 0 {
        warn!(fn_ = c.false_real, fp = c.false_fake, "Misclassified rows");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::NewArticle;
    use crate::store::Store;

    const FAKE_TEXTS: [&str; 4] = [
        "shocking secret miracle cure leaked doctors hate",
        "secret aliens control government shocking leaked",
        "miracle pill shocking secret overnight",
        "clone celebrity replaced shocking secret",
    ];
    const REAL_TEXTS: [&str; 4] = [
        "parliament passed budget after debate",
        "central bank held interest rates steady",
        "senate delayed vote healthcare bill",
        "ministers discuss trade agreement brussels",
    ];

    async fn seeded_store(dir: &std::path::Path) -> Store {
        let store = Store::create(&dir.join("lake.db")).await.unwrap();
        let texts = FAKE_TEXTS.iter().chain(REAL_TEXTS.iter());
        for (i, text) in texts.enumerate() {
            let article = NewArticle {
                url: format!("https://example.com/{i}"),
                source: "Test".into(),
                title: format!("Headline {i}"),
                text: text.to_string(),
                authors: "Unknown".into(),
                publish_date: "Unknown".into(),
            };
            store.insert_article(&article).await.unwrap();
        }
        for id in 1..=4 {
            store
                .apply_label(id, VerifiedLabel::Fake, "Match with PolitiFact (Sim: 0.90)")
                .await
                .unwrap();
        }
        for id in 5..=8 {
            store
                .apply_label(id, VerifiedLabel::Real, "Match with PolitiFact (Sim: 0.90)")
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_train_then_predict() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path()).await;
        let mut config = AppConfig::default();
        config.classifier.model_path = dir.path().join("models").join("bow.json");
        config.classifier.test_size = 0.25;
        let ctx = Context::new(config, Some(store.path().to_path_buf()));

        train(&ctx, false, None).await.unwrap();
        assert!(ctx.config.classifier.model_path.is_file());

        predict(&ctx, None).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.predictions, 8);
        assert_eq!(stats.processed, 8);

        // Everything is processed now; a second run has nothing to do.
        predict(&ctx, None).await.unwrap();
        assert_eq!(store.stats().await.unwrap().predictions, 8);
    }

    #[tokio::test]
    async fn test_predict_without_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path()).await;
        let ctx = Context::new(AppConfig::default(), Some(store.path().to_path_buf()));

        let err = predict(&ctx, Some(dir.path().join("missing.json")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("train it first"));
        assert_eq!(store.stats().await.unwrap().processed, 0);
    }

    #[tokio::test]
    async fn test_train_without_labels() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(&dir.path().join("lake.db")).await.unwrap();
        let ctx = Context::new(AppConfig::default(), Some(store.path().to_path_buf()));
        assert!(train(&ctx, false, None).await.is_err());
    }

    fn fitted_model() -> TextClassifier {
        let samples: Vec<_> = FAKE_TEXTS
            .iter()
            .map(|t| dataset::Sample::new(*t, VerifiedLabel::Fake))
            .chain(
                REAL_TEXTS
                    .iter()
                    .map(|t| dataset::Sample::new(*t, VerifiedLabel::Real)),
            )
            .collect();
        TextClassifier::fit(&samples, "v1", &Default::default()).unwrap()
    }

    #[test]
    fn test_check_samples_builds_confusion_matrix() {
        let model = fitted_model();
        let samples = vec![
            dataset::Sample::new("shocking secret leaked", VerifiedLabel::Fake),
            dataset::Sample::new("central bank held interest rates steady", VerifiedLabel::Real),
            dataset::Sample::new("miracle secret shocking", VerifiedLabel::Real),
        ];

        let evaluation = check_samples(&model, &samples);
        assert_eq!(evaluation.confusion.true_fake, 1);
        assert_eq!(evaluation.confusion.true_real, 1);
        assert_eq!(evaluation.confusion.false_fake, 1);
        assert_eq!(evaluation.confusion.false_real, 0);
        assert!((evaluation.accuracy - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_saved_model() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("bow.json");
        fitted_model().save(&model_path).unwrap();
        let input = dir.path().join("validation.json");
        std::fs::write(
            &input,
            r#"[
                {"text": "shocking secret leaked", "truth": "FAKE"},
                {"text": "parliament passed budget", "truth": "TRUE"}
            ]"#,
        )
        .unwrap();
        let ctx = Context::new(AppConfig::default(), Some(dir.path().join("unused.db")));

        validate(&ctx, &input, Some(model_path)).unwrap();
    }

    #[test]
    fn test_validate_without_model() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("validation.json");
        std::fs::write(&input, r#"[{"text": "x", "truth": "FAKE"}]"#).unwrap();
        let ctx = Context::new(AppConfig::default(), None);

        let err = validate(&ctx, &input, Some(dir.path().join("missing.json"))).unwrap_err();
        assert!(err.to_string().contains("train it first"));
    }

    #[test]
    fn test_validate_rejects_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("bow.json");
        fitted_model().save(&model_path).unwrap();
        let input = dir.path().join("validation.json");
        std::fs::write(&input, "[]").unwrap();
        let ctx = Context::new(AppConfig::default(), None);

        assert!(validate(&ctx, &input, Some(model_path)).is_err());
    }

    #[test]
    fn test_score_reports_winning_class_probability() {
        let model = fitted_model();
        let pending = vec![PendingArticle {
            id: 42,
            title: "t".into(),
            text: "shocking secret leaked".into(),
            source: "s".into(),
        }];

        let predictions = score(&model, &pending);
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].article_id, 42);
        assert_eq!(predictions[0].model_version, "v1");
        assert_eq!(predictions[0].predicted_label, VerifiedLabel::Fake);
        assert!(predictions[0].confidence >= 0.5);
    }
}
