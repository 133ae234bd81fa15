// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TABELA DE PADRÕES POR MÓDULO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Ordem importa: o primeiro padrão que casar define o módulo.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Module;

/// Padrão compilado de um módulo
pub struct ModulePattern {
    pub regex: Regex,
    /// Padrão de dúvida/explicação/conceito (confiança 0.95)
    pub high_confidence: bool,
}

fn p(source: &str) -> ModulePattern {
    pattern(source, false)
}

fn pattern(source: &str, high_confidence: bool) -> ModulePattern {
    ModulePattern {
        regex: Regex::new(&format!("(?i){}", source)).expect("valid module pattern"),
        high_confidence,
    }
}

/// Tabela ordenada (módulo, padrões)
pub static MODULE_PATTERNS: Lazy<Vec<(Module, Vec<ModulePattern>)>> = Lazy::new(|| {
    vec![
        (
            Module::Professor,
            vec![
                pattern(
                    r"\b(dúvida|explicação|conceito|matéria|disciplina|como resolver|fórmula|teorema|demonstração|prova|análise|síntese|comparar|explicar detalhadamente|processo complexo|estatística|probabilidade|vetores|matriz|logaritmo|exponencial|limite|continuidade)\b",
                    true,
                ),
                p(r"\b(geometria|álgebra|trigonometria|cálculo|derivada|integral|equação|função)\b"),
                p(r"\b(física|química|biologia|história|geografia|português|literatura|redação|matemática)\b"),
                p(r"\b(me ajude com.*dúvida|tirar uma dúvida|ajuda com.*exercício|não entendo|não sei como|como fazer|como calcular|como resolver)\b"),
                p(r"\b(questão|exercício|problema|resolução|solução|método|técnica|estratégia)\b"),
            ],
        ),
        (
            Module::Enem,
            vec![
                p(r"\b(enem|simulado|tri|prova objetiva|redação|questões de múltipla escolha|gabarito)\b"),
                p(r"\b(simulado rápido|questões enem|prova rápida|vestibular|concurso)\b"),
                p(r"\b(nota|pontuação|classificação|ranking|resultado)\b"),
            ],
        ),
        (
            Module::AulaInterativa,
            vec![
                p(r"\b(aula interativa|slides|explicação passo a passo|atividade|demonstração|aula dinâmica|aula participativa)\b"),
                p(r"\b(aula completa|aula detalhada|aula expandida|material didático|conteúdo educacional)\b"),
                p(r"\b(apresentação|exposição|explicação visual|diagrama|gráfico|ilustração)\b"),
            ],
        ),
        (
            Module::Ti,
            vec![
                p(r"\b(projetor|internet|lenta|login|não funciona|configurar|impressora|bug|sistema|computador|travou|build|deploy|render|porta|log|404|405|nextauth|rota|api)\b"),
                p(r"\b(problema técnico|suporte técnico|equipamento|tecnologia|software|hardware)\b"),
                p(r"\b(erro|falha|bug|crash|travamento|lentidão|conexão|rede|wifi|bluetooth)\b"),
            ],
        ),
        (
            Module::Financeiro,
            vec![
                p(r"\b(pagamento|boleto|mensalidade|financeiro|valor|preço|custo|desconto|parcelamento|taxa de matrícula)\b"),
                p(r"\b(dinheiro|reais|reembolso|estorno|cartão|débito|crédito|transferência)\b"),
            ],
        ),
        (
            Module::Rh,
            vec![
                p(r"\b(benefícios|férias|ferias|atestado|atestado médico|médico|salário|salario|treinamento|carreira|promoção|promocao|recursos humanos|colaboradores|funcionários|funcionarios|direitos trabalhistas|trabalhista|clt|consolidação das leis do trabalho)\b"),
                p(r"\b(1/3.*férias|1/3.*ferias|terço.*férias|terco.*ferias|saldo.*férias|saldo.*ferias)\b"),
                p(r"\b(décimo terceiro|decimo terceiro|13º|13o|terceiro|quando sai|quando pagam|pagamento do|valor do)\b"),
                p(r"\b(folha de pagamento|holerite|contracheque|admissão|demissão|rescisão)\b"),
            ],
        ),
        (
            Module::SocialMedia,
            vec![
                p(r"\b(post|rede social|instagram|facebook|tiktok|youtube|conteúdo digital|marketing digital|postagem|compartilhar nas redes)\b"),
                p(r"\b(mídia social|mídias sociais|social media|conteúdo viral|engajamento|seguidores)\b"),
            ],
        ),
        (
            Module::BemEstar,
            vec![
                p(r"\b(ansioso|ansiosa|conflito|colega|apoio|emocional|estresse|depressão|depressao|bullying|familiar|saúde|saude|mental|psicólogo|psicologo|psicóloga|psicologa|terapia|apoio emocional)\b"),
                p(r"\b(me sinto|estou|sinto|preciso de ajuda|quero ajuda|preciso falar)\b[\s\S]*\b(triste|ansioso|ansiosa|deprimido|deprimida|angustiado|angustiada|sobrecarregado|sobrecarregada|com medo|em pânico|em panico|sem esperança|desmotivado|desmotivada|cansado|cansada)\b"),
                p(r"\b(ansiedade|depressão|depressao|crise de pânico|crise de panico|saúde mental|saude mental)\b"),
                p(r"\b(crise|emergência|urgente|preciso falar|quero conversar|me ajuda|ajuda emocional)\b"),
            ],
        ),
        (
            Module::Coordenacao,
            vec![
                p(r"\b(calendário|provas|coordenador|pedagógico|gestão|acadêmica|planejamento|metodologia|ensino)\b"),
                p(r"\b(currículo|grade curricular|disciplinas|horários|cronograma|agenda)\b"),
            ],
        ),
        (
            Module::Secretaria,
            vec![
                p(r"\b(matrícula|documentos|horário|secretaria|whats|procedimentos|administrativos)\b"),
                p(r"\b(certificado|diploma|histórico|transcrição|declaração|comprovante)\b"),
            ],
        ),
        (
            Module::ConteudoMidia,
            vec![
                p(r"\b(preciso de uma imagem|diagrama|gráfico|ilustração|infográfico|conteúdo visual|material visual)\b"),
                p(r"\b(imagem|foto|figura|desenho|esquema|mapa|tabela)\b"),
            ],
        ),
        (
            Module::Atendimento,
            vec![
                p(r"\b(oi|olá|tudo bem|td bem|bom dia|boa tarde|boa noite)\b"),
                p(r"\b(ajuda|suporte|atendimento|informação|dúvida geral|não sei|preciso de ajuda)\b"),
            ],
        ),
    ]
});

/// Primeiro padrão que casa: (módulo, padrão de alta confiança?, trecho do padrão)
pub fn first_match(message: &str) -> Option<(Module, bool, &'static str)> {
    MODULE_PATTERNS.iter().find_map(|(module, patterns)| {
        patterns
            .iter()
            .find(|pat| pat.regex.is_match(message))
            .map(|pat| (*module, pat.high_confidence, pat.regex.as_str()))
    })
}

/// Todos os módulos com pelo menos um padrão casando, na ordem da tabela
pub fn matching_modules(message: &str) -> Vec<(Module, bool)> {
    MODULE_PATTERNS
        .iter()
        .filter_map(|(module, patterns)| {
            patterns
                .iter()
                .find(|pat| pat.regex.is_match(message))
                .map(|pat| (*module, pat.high_confidence))
        })
        .collect()
}
