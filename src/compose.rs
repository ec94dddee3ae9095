//! Rule-based answer composition.
//!
//! Two paths: with no retrieved context, an ordered table of
//! keyword-category rules picks a canned reply; with context, a second
//! table dispatches to per-category extractors that scan the retrieved
//! passages for structured facts (modalities, course names, prices,
//! schedule lines) and cite their sources. Both tables are checked in a
//! fixed order, so overlapping keyword sets resolve the same way every
//! time. All replies are Brazilian Portuguese. Nothing in here can fail:
//! every input maps to some string.

use std::collections::BTreeSet;

use regex::Regex;

use crate::models::ScoredChunk;

/// Final safety net when the answer path itself blows up.
pub const APOLOGY: &str =
    "Desculpe, ocorreu um erro ao processar sua pergunta. Tente novamente.";

/// Reply for an empty or whitespace-only question.
pub const BLANK_QUESTION_REPLY: &str =
    "Por favor, digite uma pergunta para que eu possa ajudar.";

const SCHEDULE_FALLBACK: &str = "Nosso atendimento funciona de segunda a sexta, das 08:00 às 21:00, e aos sábados, das 08:00 às 12:00. Para outros assuntos, consulte a secretaria acadêmica ou o portal oficial.";

const COURSES_FALLBACK: &str = "Oferecemos diversos cursos de graduação e pós-graduação. Para informações detalhadas, consulte o catálogo de cursos no site oficial da instituição.";

const ENROLLMENT_FALLBACK: &str = "Para informações sobre matrículas e inscrições, acesse o portal do aluno, verifique os documentos necessários e confirme os prazos com a secretaria acadêmica.";

const PRICING_FALLBACK: &str = "Os valores variam conforme o curso e a modalidade. Para informações sobre mensalidades, formas de pagamento e descontos, entre em contato com o setor financeiro.";

const GENERIC_FALLBACK: &str = "Obrigado pela sua pergunta! Posso ajudar com informações sobre cursos, modalidades, matrículas, valores e horários de atendimento. Para outros assuntos, entre em contato com nossa equipe ou consulte a documentação oficial.";

/// Checked top to bottom; the first keyword hit wins. A question touching
/// several categories always resolves to the earliest entry.
const FALLBACK_RULES: &[(&[&str], &str)] = &[
    (&["horário", "horarios", "funcionamento"], SCHEDULE_FALLBACK),
    (&["curso", "cursos", "graduação"], COURSES_FALLBACK),
    (&["matrícula", "inscrição"], ENROLLMENT_FALLBACK),
    (&["preço", "valor", "mensalidade"], PRICING_FALLBACK),
];

struct ContextRule {
    keywords: &'static [&'static str],
    extract: fn(&str, &[String]) -> String,
}

/// Context-path dispatch, also ordered. Modalities outrank courses so
/// "modalidades de curso" lands on the modality extractor.
const CONTEXT_RULES: &[ContextRule] = &[
    ContextRule {
        keywords: &["modalidade", "modalidades", "tipos", "formas"],
        extract: modalities_reply,
    },
    ContextRule {
        keywords: &["curso", "cursos", "graduação", "graduacao"],
        extract: courses_reply,
    },
    ContextRule {
        keywords: &["preço", "preco", "valor", "mensalidade", "custo", "pagamento"],
        extract: pricing_reply,
    },
    ContextRule {
        keywords: &["horário", "horario", "funcionamento", "atendimento"],
        extract: schedule_reply,
    },
    ContextRule {
        keywords: &["matrícula", "matricula", "inscrição", "inscricao"],
        extract: enrollment_reply,
    },
];

/// Turns a question and its retrieved context into a user-facing reply.
pub fn compose(question: &str, hits: &[ScoredChunk]) -> String {
    if hits.is_empty() {
        fallback_reply(question)
    } else {
        context_reply(question, hits)
    }
}

fn fallback_reply(question: &str) -> String {
    let question = question.to_lowercase();
    for (keywords, reply) in FALLBACK_RULES {
        if keywords.iter().any(|k| question.contains(k)) {
            return (*reply).to_string();
        }
    }
    GENERIC_FALLBACK.to_string()
}

fn context_reply(question: &str, hits: &[ScoredChunk]) -> String {
    let content = combined_content(hits);
    let sources = distinct_sources(hits);
    let question = question.to_lowercase();

    for rule in CONTEXT_RULES {
        if rule.keywords.iter().any(|k| question.contains(k)) {
            return (rule.extract)(&content, &sources);
        }
    }
    generic_context_reply(&content, &sources)
}

/// Retrieved passage contents joined into one scan target.
pub(crate) fn combined_content(hits: &[ScoredChunk]) -> String {
    let parts: Vec<&str> = hits.iter().map(|h| h.content.as_str()).collect();
    parts.join(" ")
}

/// Source names in first-seen order, without duplicates.
pub(crate) fn distinct_sources(hits: &[ScoredChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for hit in hits {
        if !sources.iter().any(|s| s == &hit.source_name) {
            sources.push(hit.source_name.clone());
        }
    }
    sources
}

pub(crate) fn attribution(sources: &[String]) -> String {
    format!("📄 Fonte(s): {}", sources.join(", "))
}

// ============================================================
// Per-category extractors
// ============================================================

fn modalities_reply(content: &str, sources: &[String]) -> String {
    let content = content.to_lowercase();
    let mut found: Vec<&str> = Vec::new();

    if content.contains("presencial") {
        found.push("• **Presencial**");
    }
    if content.contains("ead") || content.contains("distância") || content.contains("distancia") {
        found.push("• **EAD (Ensino a Distância)**");
    }
    if content.contains("semipresencial")
        || content.contains("híbrido")
        || content.contains("hibrido")
    {
        found.push("• **Semipresencial/Híbrido**");
    }

    if found.is_empty() {
        return format!(
            "Os documentos disponíveis mencionam modalidades de ensino, mas sem detalhes específicos. Recomendo confirmar com a equipe acadêmica.\n\n{}",
            attribution(sources)
        );
    }
    format!(
        "🎓 **Modalidades de ensino encontradas:**\n\n{}\n\nPara mais informações sobre cada modalidade, consulte a documentação completa ou fale com a equipe acadêmica.\n\n{}",
        found.join("\n"),
        attribution(sources)
    )
}

fn courses_reply(content: &str, sources: &[String]) -> String {
    let patterns = [
        r"(?i)cursos?\s+de\s+([A-Za-zÀ-ÖØ-öø-ÿ ]+)",
        r"(?i)graduação\s+em\s+([A-Za-zÀ-ÖØ-öø-ÿ ]+)",
        r"(?i)bacharelado\s+em\s+([A-Za-zÀ-ÖØ-öø-ÿ ]+)",
        r"(?i)licenciatura\s+em\s+([A-Za-zÀ-ÖØ-öø-ÿ ]+)",
    ];

    let mut found: BTreeSet<String> = BTreeSet::new();
    for pattern in patterns {
        let re = Regex::new(pattern).expect("course pattern is valid");
        for cap in re.captures_iter(content) {
            if let Some(name) = cap.get(1) {
                let name = name.as_str().trim();
                // Short captures are regex noise, not course names.
                if name.chars().count() > 3 {
                    found.insert(title_case(name));
                }
            }
        }
    }

    if found.is_empty() {
        return format!(
            "Oferecemos diversos cursos de graduação e pós-graduação. Para detalhes sobre um curso específico, fale com a equipe acadêmica.\n\n{}",
            attribution(sources)
        );
    }
    let items: Vec<String> = found.into_iter().take(5).map(|c| format!("• {}", c)).collect();
    format!(
        "📚 **Cursos encontrados nos documentos:**\n\n{}\n\nPara grade curricular, duração e requisitos, consulte o catálogo acadêmico.\n\n{}",
        items.join("\n"),
        attribution(sources)
    )
}

fn pricing_reply(content: &str, sources: &[String]) -> String {
    let patterns = [
        r"(?i)R\$\s*[\d.,]+",
        r"(?i)valor(?:es)?\s*[:.]?\s*R\$\s*[\d.,]+",
        r"(?i)mensalidade(?:s)?\s*[:.]?\s*R\$\s*[\d.,]+",
    ];

    let mut found: BTreeSet<String> = BTreeSet::new();
    for pattern in patterns {
        let re = Regex::new(pattern).expect("price pattern is valid");
        for m in re.find_iter(content) {
            found.insert(m.as_str().to_string());
        }
    }

    if found.is_empty() {
        return format!(
            "Para informações sobre valores e formas de pagamento:\n\n• Entre em contato com o setor financeiro\n• Consulte os valores atualizados de cada curso\n• Informe-se sobre descontos e bolsas\n\n{}",
            attribution(sources)
        );
    }
    let items: Vec<String> = found.into_iter().take(3).map(|p| format!("• {}", p)).collect();
    format!(
        "💰 **Valores encontrados nos documentos:**\n\n{}\n\nPara valores atualizados, formas de pagamento e descontos, entre em contato com o setor financeiro.\n\n{}",
        items.join("\n"),
        attribution(sources)
    )
}

fn schedule_reply(content: &str, sources: &[String]) -> String {
    // Lines carrying a clock time, like "08:00", "8h" or "8h30".
    let time = Regex::new(r"\d{1,2}(?::\d{2}|h(?:\d{2})?)").expect("time pattern is valid");

    let mut found: Vec<String> = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if !line.is_empty() && time.is_match(line) && !found.iter().any(|l| l == line) {
            found.push(line.to_string());
            if found.len() == 3 {
                break;
            }
        }
    }

    if found.is_empty() {
        return format!(
            "Os documentos não detalham horários específicos. Consulte a secretaria acadêmica ou o portal do aluno para confirmar os horários de atendimento.\n\n{}",
            attribution(sources)
        );
    }
    let items: Vec<String> = found.into_iter().map(|l| format!("• {}", l)).collect();
    format!(
        "🕐 **Horários encontrados nos documentos:**\n\n{}\n\nPara horários de setores específicos, consulte a secretaria acadêmica ou o portal do aluno.\n\n{}",
        items.join("\n"),
        attribution(sources)
    )
}

fn enrollment_reply(_content: &str, sources: &[String]) -> String {
    format!(
        "📝 **Processo de matrícula:**\n\n• Acesse o portal do aluno\n• Verifique os documentos necessários\n• Confirme prazos e procedimentos\n• Em caso de dúvida, procure a secretaria acadêmica\n\n{}",
        attribution(sources)
    )
}

fn generic_context_reply(content: &str, sources: &[String]) -> String {
    let preview: String = content.chars().take(400).collect();
    format!(
        "Com base nas informações disponíveis nos documentos:\n\n{}...\n\nPara informações mais detalhadas, consulte a documentação completa ou entre em contato com nossa equipe.\n\n{}",
        preview.trim(),
        attribution(sources)
    )
}

/// Word-wise capitalization, used to normalize extracted course names.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(source: &str, content: &str) -> ScoredChunk {
        ScoredChunk {
            content: content.to_string(),
            source_name: source.to_string(),
            chunk_index: 0,
            score: 0.9,
        }
    }

    #[test]
    fn test_fallback_schedule_is_deterministic() {
        let reply = compose("Qual o horário de atendimento?", &[]);
        assert!(reply.contains("segunda a sexta"));
        assert!(reply.contains("08:00"));
        assert_eq!(reply, compose("Qual o horário de atendimento?", &[]));
    }

    #[test]
    fn test_fallback_courses() {
        let reply = compose("Quais cursos vocês oferecem?", &[]);
        assert!(reply.contains("graduação"));
        assert!(reply.contains("catálogo"));
    }

    #[test]
    fn test_fallback_overlap_resolves_by_table_order() {
        // "matrícula" (third rule) beats "preço" (fourth rule).
        let reply = compose("Qual o preço da matrícula?", &[]);
        assert!(reply.contains("portal do aluno"));
        assert!(!reply.contains("setor financeiro"));
    }

    #[test]
    fn test_fallback_generic_for_unmatched_question() {
        let reply = compose("Olá, tudo bem?", &[]);
        assert!(reply.contains("Posso ajudar"));
    }

    #[test]
    fn test_modalities_extractor_lists_found_modalities() {
        let hits = [hit("catalog.pdf", "A instituição oferece ensino EAD e presencial.")];
        let reply = compose("Quais são as modalidades?", &hits);

        assert!(reply.contains("Presencial"));
        assert!(reply.contains("EAD"));
        assert!(reply.contains("catalog.pdf"));
    }

    #[test]
    fn test_modalities_without_matches_still_cites_sources() {
        let hits = [hit("guia.pdf", "A biblioteca abre de segunda a sexta.")];
        let reply = compose("Quais modalidades existem?", &hits);

        assert!(reply.contains("guia.pdf"));
        assert!(reply.contains("Fonte"));
    }

    #[test]
    fn test_modalities_outrank_courses_in_context_order() {
        let hits = [hit("catalog.pdf", "Cursos na modalidade presencial.")];
        let reply = compose("Quais as modalidades de curso?", &hits);

        assert!(reply.contains("Modalidades"));
        assert!(!reply.contains("Cursos encontrados"));
    }

    #[test]
    fn test_courses_extractor_finds_named_courses() {
        let hits = [hit(
            "catalogo.pdf",
            "Oferecemos o bacharelado em Sistemas e a licenciatura em Pedagogia.",
        )];
        let reply = compose("Quais cursos a universidade tem?", &hits);

        assert!(reply.contains("Cursos encontrados"));
        assert!(reply.contains("Sistemas"));
        assert!(reply.contains("Pedagogia"));
        assert!(reply.contains("catalogo.pdf"));
    }

    #[test]
    fn test_courses_reply_is_deterministic() {
        let hits = [hit(
            "a.pdf",
            "curso de Direito. curso de Administração. bacharelado em Física.",
        )];
        let first = compose("Quais os cursos?", &hits);
        let second = compose("Quais os cursos?", &hits);
        assert_eq!(first, second);
    }

    #[test]
    fn test_pricing_extractor_lists_amounts() {
        let hits = [hit(
            "valores.pdf",
            "Mensalidade: R$ 450,00. Taxa de inscrição de R$ 80,00.",
        )];
        let reply = compose("Qual o valor da mensalidade?", &hits);

        assert!(reply.contains("R$ 450,00"));
        assert!(reply.contains("valores.pdf"));
    }

    #[test]
    fn test_pricing_without_amounts_gives_contact_steps() {
        let hits = [hit("valores.pdf", "Os valores sao definidos por edital.")];
        let reply = compose("Qual o custo?", &hits);

        assert!(reply.contains("setor financeiro"));
        assert!(reply.contains("valores.pdf"));
    }

    #[test]
    fn test_schedule_extractor_picks_time_lines() {
        let hits = [hit(
            "secretaria.txt",
            "Atendimento presencial:\nSegunda a sexta das 08:00 às 21:00\nSábado das 8h às 12h\nDomingo fechado",
        )];
        let reply = compose("Qual o horário de funcionamento?", &hits);

        assert!(reply.contains("08:00"));
        assert!(reply.contains("secretaria.txt"));
    }

    #[test]
    fn test_enrollment_extractor_cites_sources() {
        let hits = [hit("edital.pdf", "A matrícula ocorre em fevereiro.")];
        let reply = compose("Como faço minha matrícula?", &hits);

        assert!(reply.contains("Processo de matrícula"));
        assert!(reply.contains("edital.pdf"));
    }

    #[test]
    fn test_generic_context_previews_and_cites() {
        let long = "O estacionamento do campus fica atrás do bloco C. ".repeat(20);
        let hits = [hit("mapa.pdf", long.trim())];
        let reply = compose("Onde fica o estacionamento?", &hits);

        assert!(reply.contains("estacionamento do campus"));
        assert!(reply.contains("..."));
        assert!(reply.contains("mapa.pdf"));
        // Preview stays bounded even for long contexts.
        assert!(reply.chars().count() < 700);
    }

    #[test]
    fn test_attribution_deduplicates_sources_in_order() {
        let hits = [
            hit("a.pdf", "valor R$ 100,00"),
            hit("b.pdf", "valor R$ 200,00"),
            hit("a.pdf", "valor R$ 300,00"),
        ];
        let reply = compose("Qual o valor?", &hits);
        assert!(reply.contains("a.pdf, b.pdf"));
    }

    #[test]
    fn test_title_case_matches_word_boundaries() {
        assert_eq!(title_case("ciência da computação"), "Ciência Da Computação");
        assert_eq!(title_case("DIREITO"), "Direito");
    }
}
