use std::{path::Path, sync::Arc};

use crate::{
    error::GlineError,
    ffi::{self, NativeApi, codec::run_batch},
    model::{
        Entity, EntityMode, ModelFiles, ModelKind, download::resolve_model_files,
        handle::ModelHandle,
    },
};

/// A span-mode or token-mode model. Both emit [`Entity`] records.
#[derive(Debug)]
pub struct EntityModel {
    mode: EntityMode,
    handle: ModelHandle,
}

impl EntityModel {
    pub fn span(model_path: &Path, tokenizer_path: &Path) -> Result<Self, GlineError> {
        Self::with_api(ffi::library()?, EntityMode::Span, model_path, tokenizer_path)
    }

    pub fn token(model_path: &Path, tokenizer_path: &Path) -> Result<Self, GlineError> {
        Self::with_api(ffi::library()?, EntityMode::Token, model_path, tokenizer_path)
    }

    /// Downloads `model_id` into the default cache and loads it in `mode`.
    pub fn from_hub(model_id: &str, mode: EntityMode) -> Result<Self, GlineError> {
        let api = ffi::library()?;
        let files = resolve_model_files(model_id, None)?;
        Self::from_files(api, mode, &files)
    }

    pub fn from_files(
        api: Arc<dyn NativeApi>,
        mode: EntityMode,
        files: &ModelFiles,
    ) -> Result<Self, GlineError> {
        Self::with_api(api, mode, &files.model_path, &files.tokenizer_path)
    }

    pub fn with_api(
        api: Arc<dyn NativeApi>,
        mode: EntityMode,
        model_path: &Path,
        tokenizer_path: &Path,
    ) -> Result<Self, GlineError> {
        let handle = ModelHandle::open(api, mode.into(), model_path, tokenizer_path)?;
        Ok(Self { mode, handle })
    }

    pub fn mode(&self) -> EntityMode {
        self.mode
    }

    pub fn kind(&self) -> ModelKind {
        self.handle.kind()
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub fn close(&self) {
        self.handle.close();
    }

    /// Extracts entities for every text in `texts`.
    ///
    /// Returns one list per input text, in input order. An empty batch is
    /// answered locally with an empty list.
    pub fn predict<S, L>(&self, texts: &[S], labels: &[L]) -> Result<Vec<Vec<Entity>>, GlineError>
    where
        S: AsRef<str>,
        L: AsRef<str>,
    {
        let mode = self.mode;
        self.handle.with_live(|api, model| {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            run_batch(
                api,
                texts,
                labels,
                GlineError::InferenceFailed(mode.into()),
                |inputs, input_count, labels, label_count| unsafe {
                    api.inference(mode, model, inputs, input_count, labels, label_count)
                },
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::atomic::Ordering};

    use super::*;
    use crate::ffi::testing::{StubApi, span};

    fn model(stub: &Arc<StubApi>, mode: EntityMode) -> EntityModel {
        EntityModel::with_api(
            stub.clone(),
            mode,
            &PathBuf::from("model.onnx"),
            &PathBuf::from("tokenizer.json"),
        )
        .unwrap()
    }

    #[test]
    fn predict_returns_one_list_per_text_in_order() {
        let stub = Arc::new(StubApi::with_spans(vec![
            span(0, "organization", "Google"),
            span(0, "person", "Larry Page"),
            span(2, "person", "Ada"),
            span(2, "location", "London"),
            span(2, "date", "1843"),
            span(1, "person", "Grace"),
        ]));
        let model = model(&stub, EntityMode::Span);

        let out = model
            .predict(
                &["Google was founded by Larry Page.", "Grace", "Ada in London, 1843"],
                &["person", "organization", "location", "date"],
            )
            .unwrap();

        assert_eq!(out.len(), 3);
        let lens: Vec<usize> = out.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![2, 1, 3]);
        assert_eq!(out[0][0].label, "organization");
        assert_eq!(out[0][0].text, "Google");
        assert_eq!(out[0][1].label, "person");
        assert_eq!(out[0][1].text, "Larry Page");
        assert!(out.iter().flatten().all(|e| (0.0..=1.0).contains(&e.probability)));
        assert_eq!(StubApi::count(&stub.results_freed), 1);
    }

    #[test]
    fn variant_tag_selects_entry_point() {
        let stub = Arc::new(StubApi::default());
        let token = model(&stub, EntityMode::Token);
        token.predict(&["text"], &["person"]).unwrap();
        assert_eq!(stub.last_mode(), Some(EntityMode::Token));

        let span_model = model(&stub, EntityMode::Span);
        span_model.predict(&["text"], &["person"]).unwrap();
        assert_eq!(stub.last_mode(), Some(EntityMode::Span));
    }

    #[test]
    fn out_of_range_records_are_discarded_silently() {
        let stub = Arc::new(StubApi::with_spans(vec![
            span(0, "person", "kept"),
            span(1, "person", "stray"),
        ]));
        let model = model(&stub, EntityMode::Span);

        let out = model.predict(&["only text"], &["person"]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 1);
        assert_eq!(out[0][0].text, "kept");
        assert_eq!(StubApi::count(&stub.results_freed), 1);
    }

    #[test]
    fn null_inference_result_is_an_error_without_partial_output() {
        let stub = Arc::new(StubApi::with_spans(vec![span(0, "person", "x")]));
        stub.fail_inference.store(true, Ordering::SeqCst);
        let model = model(&stub, EntityMode::Span);

        let err = model.predict(&["text"], &["person"]).unwrap_err();
        assert!(matches!(err, GlineError::InferenceFailed(ModelKind::Span)));
        assert_eq!(StubApi::count(&stub.results_freed), 0);
    }

    #[test]
    fn predict_after_close_makes_no_native_call() {
        let stub = Arc::new(StubApi::default());
        let model = model(&stub, EntityMode::Span);
        model.close();

        let err = model.predict(&["text"], &["person"]).unwrap_err();
        assert!(matches!(err, GlineError::ModelClosed));
        assert_eq!(StubApi::count(&stub.inference_calls), 0);
    }

    #[test]
    fn empty_batch_is_answered_locally() {
        let stub = Arc::new(StubApi::default());
        let model = model(&stub, EntityMode::Span);

        let out = model.predict::<&str, &str>(&[], &["person"]).unwrap();
        assert!(out.is_empty());
        assert_eq!(StubApi::count(&stub.inference_calls), 0);
    }

    #[test]
    fn texts_are_passed_through_in_order() {
        let stub = Arc::new(StubApi::default());
        let model = model(&stub, EntityMode::Span);

        model.predict(&["a", "b", "c"], &["person"]).unwrap();
        assert_eq!(stub.last_inputs(), vec!["a", "b", "c"]);
    }

    #[test]
    fn concurrent_predict_and_close_never_overlap() {
        let stub = Arc::new(StubApi::with_spans(vec![span(0, "person", "x")]));
        let model = Arc::new(model(&stub, EntityMode::Span));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let model = Arc::clone(&model);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        match model.predict(&["text"], &["person"]) {
                            Ok(out) => assert_eq!(out.len(), 1),
                            Err(GlineError::ModelClosed) => break,
                            Err(other) => panic!("unexpected error: {other}"),
                        }
                    }
                })
            })
            .collect();
        model.close();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(StubApi::count(&stub.models_freed), 1);
        assert_eq!(
            StubApi::count(&stub.results_freed),
            StubApi::count(&stub.inference_calls)
        );
    }
}
