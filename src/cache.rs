// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CACHE AGRESSIVO (TTL + EVICÇÃO POR HITS)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Cache genérico em memória com TTL e tamanho máximo.
// Quando cheio, remove a entrada com MENOS hits (empate: acesso mais antigo).
// Usado para classificações, questões ENEM, avaliações de redação
// e resultados de busca de imagens.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Configuração do cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL padrão das entradas
    pub ttl: Duration,
    /// Número máximo de entradas
    pub max_entries: usize,
    /// Nome usado em logs e no resumo
    pub name: &'static str,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 1000,
            name: "cache",
        }
    }
}

impl CacheConfig {
    /// Classificação de módulos: 1 hora, 200 entradas
    pub fn classification() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_entries: 200,
            name: "classification",
        }
    }

    /// Questões ENEM: 5 minutos
    pub fn enem_questions() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 500,
            name: "enem-questions",
        }
    }

    /// Avaliações de redação: 30 minutos, 100 entradas
    pub fn essay_evaluations() -> Self {
        Self {
            ttl: Duration::from_secs(1800),
            max_entries: 100,
            name: "redacao",
        }
    }

    /// Contexto de conversas: 30 minutos, 500 conversas
    pub fn conversation_context() -> Self {
        Self {
            ttl: Duration::from_secs(1800),
            max_entries: 500,
            name: "conversation-context",
        }
    }

    /// Resultados de busca de imagens: 1 hora
    pub fn images() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_entries: 1000,
            name: "images",
        }
    }

    /// Configuração para testes (TTL longo, poucas entradas)
    pub fn for_tests() -> Self {
        Self {
            ttl: Duration::from_secs(86400),
            max_entries: 100,
            name: "test",
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
    hit_count: u64,
    last_accessed: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            inserted_at: now,
            ttl,
            hit_count: 0,
            last_accessed: now,
        }
    }

    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// Estatísticas do cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub evictions: u64,
    /// Taxa de hit (0.0 - 1.0)
    pub hit_rate: f64,
}

/// Cache genérico thread-safe com TTL
///
/// ```rust,ignore
/// let cache: TtlCache<String, Classification> = TtlCache::new(CacheConfig::classification());
/// cache.insert(key.clone(), classification);
/// if let Some(hit) = cache.get(&key) { ... }
/// ```
pub struct TtlCache<K, V> {
    store: RwLock<HashMap<K, CacheEntry<V>>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Armazena valor com TTL padrão
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.config.ttl);
    }

    /// Armazena valor com TTL customizado
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        if let Ok(mut store) = self.store.write() {
            if !store.contains_key(&key) && store.len() >= self.config.max_entries {
                self.evict_expired(&mut store);
                if store.len() >= self.config.max_entries {
                    self.evict_least_hit(&mut store);
                }
            }
            store.insert(key, CacheEntry::new(value, ttl));
        }
    }

    /// Recupera valor e incrementa o contador de hits da entrada.
    ///
    /// Entradas expiradas são removidas e contam como miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Ok(mut store) = self.store.write() {
            let expired = match store.get_mut(key) {
                Some(entry) if !entry.is_expired() => {
                    entry.hit_count += 1;
                    entry.last_accessed = Instant::now();
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => true,
                None => false,
            };
            if expired {
                store.remove(key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Verifica se a chave existe e não expirou (não conta hit/miss)
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store
            .read()
            .map(|store| store.get(key).map(|e| !e.is_expired()).unwrap_or(false))
            .unwrap_or(false)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store
            .write()
            .ok()
            .and_then(|mut store| store.remove(key).map(|e| e.value))
    }

    pub fn clear(&self) {
        if let Ok(mut store) = self.store.write() {
            store.clear();
        }
    }

    /// Remove entradas expiradas, retornando quantas saíram
    pub fn cleanup_expired(&self) -> usize {
        match self.store.write() {
            Ok(mut store) => self.evict_expired(&mut store),
            Err(_) => 0,
        }
    }

    fn evict_expired(&self, store: &mut HashMap<K, CacheEntry<V>>) -> usize {
        let before = store.len();
        store.retain(|_, entry| !entry.is_expired());
        let removed = before - store.len();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    fn evict_least_hit(&self, store: &mut HashMap<K, CacheEntry<V>>) {
        let victim = store
            .iter()
            .min_by(|(_, a), (_, b)| {
                a.hit_count
                    .cmp(&b.hit_count)
                    .then(a.last_accessed.cmp(&b.last_accessed))
            })
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            store.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            log::debug!("🧹 [CACHE:{}] evicção por hits", self.config.name);
        }
    }

    pub fn len(&self) -> usize {
        self.store.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            entries: self.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Resumo formatado para logs
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "{}: {} entries | {:.1}% hit rate ({} hits, {} misses) | {} evictions | TTL: {}s",
            self.config.name,
            stats.entries,
            stats.hit_rate * 100.0,
            stats.hits,
            stats.misses,
            stats.evictions,
            self.config.ttl.as_secs()
        )
    }
}

impl<K, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.config.name)
            .field("max_entries", &self.config.max_entries)
            .field("ttl", &self.config.ttl)
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BUSCA DE IMAGENS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Origem de uma imagem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    Wikimedia,
    Unsplash,
    Other,
}

impl ImageSource {
    fn priority_bonus(&self) -> f64 {
        match self {
            ImageSource::Wikimedia => 0.1,
            ImageSource::Unsplash => 0.05,
            ImageSource::Other => 0.0,
        }
    }
}

/// Resultado de busca de imagem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    pub url: String,
    pub title: String,
    pub source: ImageSource,
    /// Relevância informada pelo provedor (0.0 - 1.0)
    pub relevance: f64,
}

/// Ordena imagens por relevância para a query.
///
/// score = relevância + 0.1 por termo da query presente no título (máx 0.3)
/// + bônus da fonte. URLs repetidas são descartadas (mantém a primeira).
pub fn rank_images(results: Vec<ImageResult>, query: &str) -> Vec<ImageResult> {
    let terms: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .map(str::to_string)
        .collect();

    let mut seen = std::collections::HashSet::new();
    let mut scored: Vec<(f64, ImageResult)> = results
        .into_iter()
        .filter(|img| seen.insert(img.url.clone()))
        .map(|img| {
            let title = img.title.to_lowercase();
            let matches = terms.iter().filter(|t| title.contains(t.as_str())).count();
            let score = img.relevance
                + (matches as f64 * 0.1).min(0.3)
                + img.source.priority_bonus();
            (score, img)
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, img)| img).collect()
}

/// Cache de resultados de imagens por query normalizada
pub struct ImageSearchCache {
    inner: TtlCache<String, Vec<ImageResult>>,
}

impl ImageSearchCache {
    pub fn new(config: CacheConfig) -> Self {
        Self { inner: TtlCache::new(config) }
    }

    fn key(query: &str) -> String {
        query.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn get(&self, query: &str) -> Option<Vec<ImageResult>> {
        self.inner.get(&Self::key(query))
    }

    /// Ranqueia e armazena; retorna a lista ranqueada
    pub fn store(&self, query: &str, results: Vec<ImageResult>) -> Vec<ImageResult> {
        let ranked = rank_images(results, query);
        self.inner.insert(Self::key(query), ranked.clone());
        ranked
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

impl Default for ImageSearchCache {
    fn default() -> Self {
        Self::new(CacheConfig::images())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(max: usize) -> CacheConfig {
        CacheConfig {
            max_entries: max,
            ..CacheConfig::for_tests()
        }
    }

    #[test]
    fn test_cache_set_get() {
        let cache: TtlCache<String, u32> = TtlCache::new(CacheConfig::for_tests());
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_miss() {
        let cache: TtlCache<String, u32> = TtlCache::new(CacheConfig::for_tests());
        assert_eq!(cache.get("nada"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_cache_expiration() {
        let cache: TtlCache<String, u32> = TtlCache::new(CacheConfig::for_tests());
        cache.insert_with_ttl("a".to_string(), 1, Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_evicts_least_hit_entry() {
        let cache: TtlCache<String, u32> = TtlCache::new(small(2));
        cache.insert("popular".to_string(), 1);
        cache.insert("frio".to_string(), 2);
        cache.get("popular");
        cache.get("popular");

        cache.insert("novo".to_string(), 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("popular"));
        assert!(cache.contains("novo"));
        assert!(!cache.contains("frio"));
    }

    #[test]
    fn test_tie_on_hits_evicts_oldest_access() {
        let cache: TtlCache<String, u32> = TtlCache::new(small(2));
        cache.insert("primeiro".to_string(), 1);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("segundo".to_string(), 2);
        cache.insert("terceiro".to_string(), 3);
        assert!(!cache.contains("primeiro"));
        assert!(cache.contains("segundo"));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache: TtlCache<String, u32> = TtlCache::new(small(2));
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.insert("a".to_string(), 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_cleanup_expired() {
        let cache: TtlCache<String, u32> = TtlCache::new(CacheConfig::for_tests());
        cache.insert_with_ttl("velho".to_string(), 1, Duration::ZERO);
        cache.insert("novo".to_string(), 2);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stats_hit_rate() {
        let cache: TtlCache<String, u32> = TtlCache::new(CacheConfig::for_tests());
        cache.insert("a".to_string(), 1);
        cache.get("a");
        cache.get("a");
        cache.get("b");
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!(cache.summary().contains("66.7%"));
    }

    #[test]
    fn test_rank_images_prefers_title_matches_and_dedupes() {
        let images = vec![
            ImageResult {
                url: "https://x/1.jpg".into(),
                title: "Paisagem".into(),
                source: ImageSource::Other,
                relevance: 0.5,
            },
            ImageResult {
                url: "https://x/2.jpg".into(),
                title: "Célula animal microscópio".into(),
                source: ImageSource::Wikimedia,
                relevance: 0.4,
            },
            ImageResult {
                url: "https://x/1.jpg".into(),
                title: "duplicada".into(),
                source: ImageSource::Unsplash,
                relevance: 0.9,
            },
        ];

        let ranked = rank_images(images, "célula animal");
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].url, "https://x/2.jpg");
    }

    #[test]
    fn test_image_cache_normalizes_query() {
        let cache = ImageSearchCache::new(CacheConfig::for_tests());
        cache.store(
            "Fotossíntese  Plantas",
            vec![ImageResult {
                url: "u".into(),
                title: "fotossíntese".into(),
                source: ImageSource::Unsplash,
                relevance: 0.7,
            }],
        );
        assert!(cache.get("fotossíntese plantas").is_some());
    }
}
