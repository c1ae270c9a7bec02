//! Authoring surface: where specs are declared.

use std::sync::Arc;

use crate::context::RunContext;
use crate::error::{GraderResult, UnpreparedTestConfiguration};
use crate::spec::builder::{Draft, Instantiated, Named, TypeSelected};
use crate::spec::{SpecRegistry, SpecTemplate, TestSpec, TestSpecBuilder};

/// Points for a style check unless the caller says otherwise.
pub const DEFAULT_STYLE_POINTS: f64 = 2.0;
/// File existence checks are worth a token amount.
pub const FILE_EXISTS_POINTS: f64 = 0.01;

/// A suite of specs for one submission, bound to its [`RunContext`].
///
/// ```ignore
/// let mut suite = Suite::new(ctx);
/// suite
///     .test("add small numbers")
///     .hint("add should return the sum")
///     .class("Adder")?
///     .constructor_args(Vec::<Arg>::new())
///     .instantiate()
///     .await?
///     .checking_return()
///     .method("add")
///     .args([2, 3])
///     .build()?;
/// ```
pub struct Suite {
    ctx: Arc<RunContext>,
    registry: SpecRegistry,
    retained: Option<Draft>,
}

impl Suite {
    pub fn new(ctx: Arc<RunContext>) -> Self {
        Self {
            ctx,
            registry: SpecRegistry::new(),
            retained: None,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn shared_context(&self) -> Arc<RunContext> {
        Arc::clone(&self.ctx)
    }

    pub fn registry(&self) -> &SpecRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut SpecRegistry {
        &mut self.registry
    }

    /// Start a new spec.
    pub fn test(&mut self, name: impl Into<String>) -> TestSpecBuilder<'_, Named> {
        let draft = Draft::new(name.into(), self.ctx.config.default_visibility);
        TestSpecBuilder::from_draft(self, draft)
    }

    /// Start a spec from a template. Each use gets its own seed.
    pub fn prepared(
        &mut self,
        template: &SpecTemplate,
    ) -> GraderResult<TestSpecBuilder<'_, TypeSelected>> {
        template.validate()?;
        let seed = template.seed_for(self.registry.registered());
        let mut builder = self.test(template.name.clone()).max_score(template.max_score);
        if let Some(hint) = &template.hint {
            builder = builder.hint(hint.clone());
        }
        if let Some(seed) = seed {
            builder = builder.seed(seed);
        }
        if let Some(stdin) = &template.stdin {
            builder = builder.stdin(stdin.clone());
        }
        if !template.order_matters {
            builder = builder.order_insensitive();
        }
        builder.class(&template.class_name)
    }

    /// Continue from the instance pair kept by the last `retain()`.
    pub fn resume(&mut self) -> GraderResult<TestSpecBuilder<'_, Instantiated>> {
        let Some(draft) = self.retained.clone() else {
            return Err(UnpreparedTestConfiguration::new(
                "<resume>",
                "no instance pair was retained; call retain() on an instantiated builder first",
            )
            .into());
        };
        Ok(TestSpecBuilder::from_draft(self, draft))
    }

    /// Register a style check for `class_name`.
    pub fn style_check(&mut self, class_name: &str, max_score: f64) -> GraderResult<u64> {
        self.test(format!("Checkstyle {}", class_name))
            .description(format!("Checkstyle {}", class_name))
            .max_score(max_score)
            .style_check(class_name)
            .build()
    }

    /// Register a check that `file_name` was submitted.
    pub fn file_exists(&mut self, file_name: &str) -> GraderResult<u64> {
        self.test(format!("File Existence ({})", file_name))
            .max_score(FILE_EXISTS_POINTS)
            .file_exists(file_name)
            .build()
    }

    pub(crate) fn retain(&mut self, draft: Draft) {
        self.retained = Some(draft);
    }

    pub(crate) fn register(&mut self, spec: TestSpec) -> u64 {
        self.registry.register(spec)
    }

    /// Take every registered spec in sequence order.
    pub fn drain(&mut self) -> Vec<TestSpec> {
        self.registry.drain()
    }
}

impl std::fmt::Debug for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suite")
            .field("run_id", &self.ctx.run_id)
            .field("specs", &self.registry.len())
            .field("retained", &self.retained.is_some())
            .finish()
    }
}
