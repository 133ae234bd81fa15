//! # Testes de Integração
//!
//! Fluxos completos entre módulos, sem rede (clientes mock):
//! - Chat: classificação → AI router → fallback → conversa
//! - ENEM: base local → questões do simulado → pontuação
//! - Redação: rota HTTP → correção → cache
//! - Quiz: embaralhamento reprodutível por seed

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use hubedu::chat::{ChatInput, ChatService};
use hubedu::classification::{ClassificationMethod, ModuleClassifier};
use hubedu::config::ServerConfig;
use hubedu::conversation::ConversationManager;
use hubedu::enem::{calculate_score, EnemLocalDatabase, EnemQuestionService, ItemResponse, QuestionsRequest};
use hubedu::fallback::{FallbackManager, ProviderSpec};
use hubedu::llm::{LlmClient, LlmClients, LlmError, MockLlmClient};
use hubedu::quiz::{shuffle_quiz, QuizQuestion};
use hubedu::redacao::RedacaoGrader;
use hubedu::router::{AiRouter, RouterMode, SHADOW_PROVIDER_ID};
use hubedu::server::{build_router, AppState};
use hubedu::types::{ChatRole, EnemArea, Module, ProviderId};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

fn chat_service(router: Arc<AiRouter>, clients: &[Arc<MockLlmClient>]) -> ChatService {
    let specs = clients
        .iter()
        .map(|c| (ProviderSpec::default_for(c.provider()), c.clone() as Arc<dyn LlmClient>))
        .collect();
    ChatService::new(
        Arc::new(ModuleClassifier::local_only()),
        router,
        Arc::new(FallbackManager::with_specs(specs)),
        Arc::new(ConversationManager::in_memory()),
    )
}

/// Base ENEM mínima: 2024 com 4 questões de matemática e 2 de humanas
fn build_enem_base(base: &Path) {
    std::fs::write(base.join("exams.json"), json!([{ "title": "ENEM 2024", "year": 2024 }]).to_string()).unwrap();

    let listed: Vec<_> = (1..=6)
        .map(|i| {
            let discipline = if i <= 4 { "matematica" } else { "ciencias-humanas" };
            json!({ "title": format!("Q{}", i), "index": i, "discipline": discipline, "language": null })
        })
        .collect();
    std::fs::create_dir_all(base.join("2024")).unwrap();
    std::fs::write(base.join("2024/details.json"), json!({ "questions": listed }).to_string()).unwrap();

    for i in 1..=6u32 {
        let dir = base.join(format!("2024/questions/{}", i));
        std::fs::create_dir_all(&dir).unwrap();
        let discipline = if i <= 4 { "matematica" } else { "ciencias-humanas" };
        let details = json!({
            "title": format!("Questão {}", i),
            "index": i,
            "year": 2024,
            "language": null,
            "discipline": discipline,
            "context": format!("Enunciado {}", i),
            "files": [],
            "correctAlternative": "C",
            "alternativesIntroduction": "",
            "alternatives": (["A", "B", "C", "D", "E"].iter().map(|l| json!({
                "letter": l, "text": format!("opção {}", l), "file": null, "isCorrect": *l == "C"
            })).collect::<Vec<_>>())
        });
        std::fs::write(dir.join("details.json"), details.to_string()).unwrap();
    }
}

// ============================================================================
// TESTE 1: Chat com AI router em modo shadow
// O router recomenda, o provedor servido é o de shadow (OpenAI) e o resultado
// volta para a tabela de aprendizado
// ============================================================================

#[tokio::test]
async fn test_chat_with_shadow_router() {
    let openai = Arc::new(MockLlmClient::new(ProviderId::OpenAi).with_reply("Resposta via OpenAI"));
    let xai = Arc::new(MockLlmClient::new(ProviderId::Xai).with_reply("Resposta via Grok"));
    let router = Arc::new(AiRouter::default());
    router.enable();
    assert_eq!(router.config().mode, RouterMode::Shadow);

    let service = chat_service(router.clone(), &[openai.clone(), xai.clone()]);
    let reply = service
        .respond(&ChatInput {
            message: "Quero um simulado do ENEM para treinar".into(),
            user_id: Some("aluno-1".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(reply.meta.classification.module, Module::Enem);
    assert_eq!(reply.meta.route.provider_id, SHADOW_PROVIDER_ID);
    assert_eq!(reply.provider, ProviderId::OpenAi);
    assert_eq!(reply.content, "Resposta via OpenAI");
    assert_eq!(xai.calls(), 0);

    let status = router.status();
    assert_eq!(status.learning_entries, 1);
    assert_eq!(router.metrics_summary().total_decisions, 1);
}

// ============================================================================
// TESTE 2: Fallback quando o provedor preferido falha
// ============================================================================

#[tokio::test]
async fn test_chat_falls_back_and_keeps_history() {
    let openai = Arc::new(MockLlmClient::new(ProviderId::OpenAi).failing(LlmError::Network("connection reset".into())));
    let google = Arc::new(MockLlmClient::new(ProviderId::Google).with_reply("Resposta do Gemini"));
    let service = chat_service(Arc::new(AiRouter::default()), &[openai.clone(), google.clone()]);

    let first = service
        .respond(&ChatInput {
            message: "Explique o ciclo da água".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(first.provider, ProviderId::Google);
    assert!(first.fallback_chain.contains(&ProviderId::OpenAi));

    // segunda mensagem na mesma conversa: provedor com falha fica fora por um tempo
    let second = service
        .respond(&ChatInput {
            message: "E a evaporação?".into(),
            conversation_id: Some(first.meta.conversation_id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(second.provider, ProviderId::Google);

    let history = service
        .conversations()
        .history(&first.meta.conversation_id, "anonymous", 20)
        .await
        .unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].role, ChatRole::User);
    assert_eq!(history[3].content, "Resposta do Gemini");
}

// ============================================================================
// TESTE 3: Módulo forçado na requisição
// ============================================================================

#[tokio::test]
async fn test_module_override_skips_classifier() {
    let openai = Arc::new(MockLlmClient::new(ProviderId::OpenAi));
    let service = chat_service(Arc::new(AiRouter::default()), &[openai]);
    let reply = service
        .respond(&ChatInput {
            message: "Quero fazer um simulado".into(),
            module: Some("redacao".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(reply.meta.classification.module, Module::Redacao);
    assert_eq!(reply.meta.classification.method, ClassificationMethod::Context);
}

// ============================================================================
// TESTE 4: ENEM ponta a ponta
// Base local → questões do simulado → respostas do aluno → pontuação
// ============================================================================

#[tokio::test]
async fn test_enem_simulation_pipeline() {
    let dir = TempDir::new().unwrap();
    build_enem_base(dir.path());
    let service = EnemQuestionService::new(Arc::new(EnemLocalDatabase::new(dir.path())));

    let response = service
        .fetch(&QuestionsRequest {
            area: "matematica".into(),
            num_questions: 4,
            use_real_questions: true,
        })
        .await
        .unwrap();
    assert_eq!(response.total, 4);
    assert!(response.questions.iter().all(|q| q.area == "matematica"));

    // aluno acerta 3 de 4
    let responses: Vec<ItemResponse> = response
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| ItemResponse {
            item_id: q.id.clone(),
            area: EnemArea::MT,
            topic: "funções".into(),
            difficulty: Default::default(),
            is_correct: i != 0,
            time_spent: 90.0,
        })
        .collect();

    let result = calculate_score("sessao-enem", &responses).unwrap();
    let mt = &result.score.area_scores[&EnemArea::MT];
    assert_eq!(mt.correct, 3);
    assert_eq!(mt.total, 4);
    // 75% × 10 × 1.05
    assert!((mt.raw_score - 787.5).abs() < 1e-9);
    assert!(result.score.tri_estimated.score >= 300.0);
}

// ============================================================================
// TESTE 5: Redação via HTTP com cache
// ============================================================================

#[tokio::test]
async fn test_redacao_route_caches_evaluation() {
    let reply = r#"{"scores":{"comp1":160,"comp2":160,"comp3":140,"comp4":120,"comp5":120},"feedback":"Bom texto."}"#;
    let grok = Arc::new(MockLlmClient::new(ProviderId::Xai).with_reply(reply));
    let grader = RedacaoGrader::with_clients(Some(grok.clone()), None).with_retry_delay(Duration::from_millis(1));

    let clients = LlmClients::new().with(grok.clone());
    let state = AppState::new(ServerConfig::default(), &clients).with_redacao(grader);
    let app = build_router(Arc::new(state));

    let essay = "A tecnologia amplia o acesso à educação no Brasil contemporâneo. ".repeat(15);
    let request = || {
        Request::builder()
            .method("POST")
            .uri("/api/redacao/avaliar")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "theme": "2023", "content": essay }).to_string()))
            .unwrap()
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let body: serde_json::Value =
        serde_json::from_slice(&to_bytes(first.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["evaluation"]["totalScore"], 700.0);
    assert_eq!(body["performance"]["cacheHit"], false);

    let second = app.oneshot(request()).await.unwrap();
    let body: serde_json::Value =
        serde_json::from_slice(&to_bytes(second.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["performance"]["cacheHit"], true);
    assert_eq!(grok.calls(), 1);
}

// ============================================================================
// TESTE 6: Quiz reprodutível
// ============================================================================

#[test]
fn test_seeded_quiz_is_reproducible() {
    let questions: Vec<QuizQuestion> = (0..5)
        .map(|i| QuizQuestion {
            question: format!("Pergunta {}", i),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into(), "E".into()],
            correct: i % 5,
            explanation: None,
        })
        .collect();

    let first = shuffle_quiz(&questions, Some(2024)).unwrap();
    let second = shuffle_quiz(&questions, Some(2024)).unwrap();
    assert_eq!(first, second);

    for (original, shuffled) in questions.iter().zip(&first) {
        assert_eq!(original.options[original.correct], shuffled.options[shuffled.correct]);
    }
}
