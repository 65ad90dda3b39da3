use crate::config::Config;
use crate::extract::{
    AcceptancePolicy, ContentDmRecognizer, DetailPage, ExtractError, ExtractionStrategy,
    FieldRecognizer, GenericDomExtractor, ImageResolver, PatternMatchExtractor,
    SectionHeuristicExtractor, StructuredStateExtractor,
};
use crate::session::{BrowserSession, RenderWait};
use crate::state::{FieldMap, IMAGE_URL_FIELD};
use crate::ConfigError;
use url::Url;

/// Ordered extraction strategies plus the image resolver
pub struct ExtractionPipeline {
    recognizer: Box<dyn FieldRecognizer>,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    image: ImageResolver,
    acceptance: AcceptancePolicy,
    wait: RenderWait,
}

impl ExtractionPipeline {
    pub fn new(
        recognizer: Box<dyn FieldRecognizer>,
        strategies: Vec<Box<dyn ExtractionStrategy>>,
        image: ImageResolver,
        acceptance: AcceptancePolicy,
        wait: RenderWait,
    ) -> Self {
        Self {
            recognizer,
            strategies,
            image,
            acceptance,
            wait,
        }
    }

    /// The CONTENTdm recognizer with all four strategies in their usual order
    pub fn standard(base_url: Url, acceptance: AcceptancePolicy, wait: RenderWait) -> Self {
        Self::new(
            Box::new(ContentDmRecognizer),
            Self::standard_strategies(),
            ImageResolver::new(base_url),
            acceptance,
            wait,
        )
    }

    pub fn standard_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
        vec![
            Box::new(StructuredStateExtractor),
            Box::new(SectionHeuristicExtractor),
            Box::new(PatternMatchExtractor),
            Box::new(GenericDomExtractor),
        ]
    }

    /// Builds the standard pipeline from the site, browser and crawl settings
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.site.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.site.base_url, e)))?;
        let wait = RenderWait::new(
            config.site.render_marker.as_str(),
            config.browser.render_timeout(),
            config.browser.detail_settle(),
        );
        Ok(Self::standard(
            base_url,
            AcceptancePolicy::new(config.crawl.min_fields),
            wait,
        ))
    }

    pub fn is_accepted(&self, fields: &FieldMap) -> bool {
        self.acceptance.accepts(fields)
    }

    /// Renders `url` in the session and extracts its fields
    ///
    /// The returned map may be below the acceptance threshold; only a page that
    /// could not be rendered is an error.
    pub async fn extract(
        &self,
        session: &dyn BrowserSession,
        url: &Url,
    ) -> Result<FieldMap, ExtractError> {
        let source = session.render(url, &self.wait).await?;
        Ok(self.extract_from_source(url, &source))
    }

    /// Runs the strategy cascade and the image resolver over rendered source
    pub fn extract_from_source(&self, url: &Url, source: &str) -> FieldMap {
        let page = DetailPage::parse(url, source);
        let mut fields = FieldMap::new();

        for strategy in &self.strategies {
            let found = strategy.extract(&page, self.recognizer.as_ref());
            tracing::debug!(
                "{}: {} field(s) from {}",
                strategy.name(),
                found.len(),
                page.url()
            );
            for (key, value) in found {
                fields.entry(key).or_insert(value);
            }
            if self.acceptance.accepts(&fields) {
                break;
            }
        }

        if let Some(image) = self.image.resolve(&page) {
            fields
                .entry(IMAGE_URL_FIELD.to_string())
                .or_insert_with(|| image.to_string());
        }

        fields
    }
}
