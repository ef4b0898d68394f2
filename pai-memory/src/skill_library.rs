//! Skill Library (spec.md §4.11): a dedicated vector-store collection of
//! reusable execution procedures, searched semantically and gated by
//! precondition matching and a minimum success rate.

use pai_core::{ParamSpec, PaiError, PaiResult, Predicate, Skill, SkillAbstractionLevel, SkillId, Timestamp};
use pai_storage::VectorStore;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

fn skill_err(reason: impl Into<String>) -> PaiError {
    PaiError::Memory(pai_core::MemoryError::VectorStore { reason: reason.into() })
}

/// A completed execution, as reported by the agent runtime, used to
/// synthesize a reusable skill (spec.md §4.11 `learn_skill_from_execution`).
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub action: String,
    pub target: String,
    pub project_type: Option<String>,
    pub language: Option<String>,
    pub framework: Option<String>,
    pub files_modified: Vec<String>,
    pub steps: Vec<String>,
    pub root_path: String,
    pub project_name: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutionOutcome {
    pub succeeded: bool,
    pub duration_ms: f64,
}

/// The result of `instantiate_skill`: a skill's steps and file patterns
/// resolved against a concrete execution context.
#[derive(Debug, Clone)]
pub struct InstantiatedStep {
    pub description: String,
    pub files: Vec<String>,
    pub skill_source: SkillId,
}

#[derive(Debug, Clone)]
pub struct InstantiatedPlan {
    pub skill_id: SkillId,
    pub steps: Vec<InstantiatedStep>,
    pub parameters: HashMap<String, String>,
}

pub struct SkillLibrary {
    store: Arc<dyn VectorStore>,
}

impl SkillLibrary {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    fn skill_metadata(skill: &Skill) -> PaiResult<serde_json::Value> {
        serde_json::to_value(skill).map_err(|e| skill_err(e.to_string()))
    }

    fn skill_from_metadata(metadata: &serde_json::Value) -> PaiResult<Skill> {
        serde_json::from_value(metadata.clone()).map_err(|e| skill_err(e.to_string()))
    }

    pub async fn get_skill(&self, id: &str) -> PaiResult<Option<Skill>> {
        let Some(record) = self.store.get(id).await.map_err(|_| skill_err("lookup failed"))? else {
            return Ok(None);
        };
        Self::skill_from_metadata(&record.metadata).map(Some)
    }

    /// spec.md §4.11 `find_applicable_skills`: semantic search (fixed
    /// limit 20), then keep only skills whose preconditions are met and
    /// whose success rate clears `min_success_rate`.
    pub async fn find_applicable_skills(
        &self,
        goal: &str,
        context: &HashMap<String, String>,
        min_success_rate: f32,
        limit: usize,
    ) -> PaiResult<Vec<Skill>> {
        let hits = self.store.search(goal, 20, 0.0, None).await.map_err(|_| skill_err("search failed"))?;

        let mut applicable = Vec::new();
        for hit in hits {
            let Ok(skill) = Self::skill_from_metadata(&hit.metadata) else { continue };
            if skill.success_rate >= min_success_rate && skill.preconditions_met(context) {
                applicable.push(skill);
            }
            if applicable.len() >= limit {
                break;
            }
        }
        Ok(applicable)
    }

    /// spec.md §4.11 `learn_skill_from_execution`: on success, synthesize a
    /// skill from the plan and upsert it; on failure there is nothing to
    /// learn yet.
    pub async fn learn_skill_from_execution(
        &self,
        plan: &ExecutionPlan,
        outcome: ExecutionOutcome,
        now: Timestamp,
    ) -> PaiResult<Option<SkillId>> {
        if !outcome.succeeded {
            return Ok(None);
        }

        let skill = synthesize_skill(plan, now);
        let id = skill.id;
        let metadata = Self::skill_metadata(&skill)?;
        self.store
            .upsert(Some(id.to_string()), &skill.document_text(), metadata)
            .await
            .map_err(|_| skill_err("upsert failed"))?;
        Ok(Some(id))
    }

    /// spec.md §4.11 `update_skill_stats`: EWMA (`alpha = 0.2`) over success
    /// rate and duration, persisted back to the store.
    pub async fn update_skill_stats(&self, id: &str, success: bool, duration_ms: f64, now: Timestamp) -> PaiResult<()> {
        let mut skill = self.get_skill(id).await?.ok_or_else(|| {
            PaiError::Memory(pai_core::MemoryError::NotFound { id: id.to_string() })
        })?;
        skill.record_execution(success, duration_ms, 0.2, now);
        let metadata = Self::skill_metadata(&skill)?;
        self.store.update(id, None, Some(metadata)).await.map_err(|_| skill_err("stat update failed"))
    }
}

/// spec.md §4.11 `instantiate_skill`: substitute parameters and expand
/// `**` file patterns into `context["root_path"]`.
pub fn instantiate_skill(skill: &Skill, context: &HashMap<String, String>) -> InstantiatedPlan {
    let root_path = context.get("root_path").cloned().unwrap_or_default();

    let steps = skill
        .steps
        .iter()
        .map(|step| {
            let files = step
                .file_patterns
                .iter()
                .map(|pattern| pattern.replace("**", &root_path))
                .collect();
            InstantiatedStep { description: step.description.clone(), files, skill_source: skill.id }
        })
        .collect();

    InstantiatedPlan { skill_id: skill.id, steps, parameters: context.clone() }
}

fn synthesize_skill(plan: &ExecutionPlan, now: Timestamp) -> Skill {
    let name = format!("{}_{}", slug(&plan.action), slug(&plan.target));
    let description = format!("Learned from executing: {} {}", plan.action, plan.target);
    let mut skill = Skill::new(name, description, SkillAbstractionLevel::Skill, now);

    if let Some(project_type) = &plan.project_type {
        skill.preconditions.push(Predicate::key_value("project_type", project_type));
    }
    if let Some(language) = &plan.language {
        skill.preconditions.push(Predicate::key_value("language", language));
    }
    if let Some(framework) = &plan.framework {
        skill.preconditions.push(Predicate::key_value("framework", framework));
    }
    for ext in file_extensions(&plan.files_modified) {
        skill.preconditions.push(Predicate::key(format!("has_{ext}")));
    }

    for file in &plan.files_modified {
        skill.postconditions.push(Predicate::key_value("modified", file));
    }
    skill.postconditions.push(Predicate::key("success"));

    let patterns: Vec<String> = file_extensions(&plan.files_modified).into_iter().map(|ext| format!("**/*.{ext}")).collect();
    skill.steps = plan
        .steps
        .iter()
        .map(|step| pai_core::SkillStep {
            description: templatize(step, &plan.files_modified),
            file_patterns: patterns.clone(),
            agent_hint: None,
        })
        .collect();

    skill.param_specs.insert(
        "root_path".to_string(),
        ParamSpec { param_type: "string".to_string(), required: true, default: None, description: "Project root path".to_string() },
    );
    if plan.project_name.is_some() {
        skill.param_specs.insert(
            "project_name".to_string(),
            ParamSpec { param_type: "string".to_string(), required: false, default: None, description: "Project name".to_string() },
        );
    }

    skill.success_rate = 1.0;
    skill.use_count = 1;
    skill.last_used = Some(now);
    skill
}

fn templatize(step: &str, files: &[String]) -> String {
    let mut out = step.to_string();
    for file in files {
        out = out.replace(file.as_str(), &glob_for(file));
    }
    out
}

fn glob_for(file: &str) -> String {
    match Path::new(file).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("**/*.{ext}"),
        None => "**".to_string(),
    }
}

fn file_extensions(files: &[String]) -> Vec<String> {
    let mut exts: Vec<String> = files
        .iter()
        .filter_map(|f| Path::new(f).extension().and_then(|e| e.to_str()).map(str::to_string))
        .collect();
    exts.sort();
    exts.dedup();
    exts
}

fn slug(s: &str) -> String {
    s.chars().map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pai_core::{compute_content_hash, EmbeddingProvider, EmbeddingVector};
    use pai_storage::MemoryVectorStore;

    struct HashEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for HashEmbedder {
        async fn embed(&self, text: &str) -> PaiResult<EmbeddingVector> {
            let hash = compute_content_hash(text.as_bytes());
            Ok(EmbeddingVector::new(hash.iter().take(4).map(|b| *b as f32).collect(), "hash-embedder"))
        }
        async fn embed_batch(&self, texts: &[&str]) -> PaiResult<Vec<EmbeddingVector>> {
            let mut out = Vec::with_capacity(texts.len());
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }
        fn dimensions(&self) -> i32 {
            4
        }
        fn model_id(&self) -> &str {
            "hash-embedder"
        }
    }

    fn library() -> SkillLibrary {
        SkillLibrary::new(Arc::new(MemoryVectorStore::new(Arc::new(HashEmbedder))))
    }

    fn now() -> Timestamp {
        Timestamp::from_timestamp(0, 0).unwrap()
    }

    fn sample_plan() -> ExecutionPlan {
        ExecutionPlan {
            action: "deploy".to_string(),
            target: "api service".to_string(),
            project_type: Some("rust".to_string()),
            language: Some("rust".to_string()),
            framework: None,
            files_modified: vec!["src/main.rs".to_string()],
            steps: vec!["cargo build --release and copy src/main.rs artifact".to_string()],
            root_path: "/srv/app".to_string(),
            project_name: Some("api".to_string()),
        }
    }

    #[tokio::test]
    async fn failed_execution_does_not_synthesize_a_skill() {
        let library = library();
        let result = library
            .learn_skill_from_execution(&sample_plan(), ExecutionOutcome { succeeded: false, duration_ms: 10.0 }, now())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn successful_execution_is_findable_by_goal() {
        let library = library();
        let id = library
            .learn_skill_from_execution(&sample_plan(), ExecutionOutcome { succeeded: true, duration_ms: 500.0 }, now())
            .await
            .unwrap()
            .unwrap();

        let skill = library.get_skill(&id.to_string()).await.unwrap().unwrap();
        assert_eq!(skill.success_rate, 1.0);
        assert!(skill.preconditions.iter().any(|p| p.key == "project_type"));

        let mut ctx = HashMap::new();
        ctx.insert("project_type".to_string(), "rust".to_string());
        ctx.insert("language".to_string(), "rust".to_string());
        ctx.insert("has_rs".to_string(), "true".to_string());

        let found = library.find_applicable_skills("deploy api service", &ctx, 0.5, 10).await.unwrap();
        assert!(found.iter().any(|s| s.id == skill.id));
    }

    #[tokio::test]
    async fn update_skill_stats_applies_ewma() {
        let library = library();
        let id = library
            .learn_skill_from_execution(&sample_plan(), ExecutionOutcome { succeeded: true, duration_ms: 500.0 }, now())
            .await
            .unwrap()
            .unwrap();

        library.update_skill_stats(&id.to_string(), false, 1000.0, now()).await.unwrap();
        let skill = library.get_skill(&id.to_string()).await.unwrap().unwrap();
        assert!((skill.success_rate - 0.8).abs() < 1e-6);
        assert_eq!(skill.use_count, 2);
    }

    #[test]
    fn instantiate_skill_expands_root_path_glob() {
        let mut skill = Skill::new("deploy_api", "deploy the api", SkillAbstractionLevel::Skill, now());
        skill.steps.push(pai_core::SkillStep {
            description: "build".to_string(),
            file_patterns: vec!["**/*.rs".to_string()],
            agent_hint: None,
        });

        let mut ctx = HashMap::new();
        ctx.insert("root_path".to_string(), "/srv/app".to_string());

        let plan = instantiate_skill(&skill, &ctx);
        assert_eq!(plan.steps[0].files, vec!["/srv/app/*.rs".to_string()]);
        assert_eq!(plan.steps[0].skill_source, skill.id);
    }
}
