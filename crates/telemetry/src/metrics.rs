use lazy_static::lazy_static;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Face Pipeline Metrics ====
    pub static ref FACE_PIPELINE_REQUESTS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "face_pipeline_requests_total",
                "Total number of pipeline runs",
            ),
            &["operation", "outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref FACE_PIPELINE_STAGE_LATENCY: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "face_pipeline_stage_duration_seconds",
                "Duration of individual pipeline stages",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["stage"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref FACE_STORE_ENTRIES: IntGauge = {
        let metric = IntGauge::new("face_store_entries", "Number of enrolled embeddings")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref FACE_MATCH_RESULTS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "face_match_results_total",
                "Identification outcomes (identified vs unknown)",
            ),
            &["result"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Collaborator Metrics ====
    pub static ref FACE_TRANSCODE_OPERATIONS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "face_transcode_operations_total",
                "Total number of HEIC/HEIF transcode attempts",
            ),
            &["kind", "status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref FACE_EXTRACTOR_INFERENCE_TIME: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "face_extractor_inference_duration_seconds",
                "Duration of descriptor extraction calls",
            ),
            &["extractor"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}
