// src/common/i18n.rs

use std::collections::HashMap;

use anyhow::Context;

// Idioma usado quando o cliente pede algo que não temos
pub const DEFAULT_LANG: &str = "pt";

// Os catálogos vão embutidos no binário
const CATALOGS: &[(&str, &str)] = &[
    ("pt", include_str!("../../locales/pt.json")),
    ("en", include_str!("../../locales/en.json")),
];

/// Catálogo de mensagens traduzidas, indexado por idioma e chave.
#[derive(Debug, Default)]
pub struct I18nStore {
    catalogs: HashMap<String, HashMap<String, String>>,
}

impl I18nStore {
    pub fn load() -> anyhow::Result<Self> {
        let mut catalogs = HashMap::new();
        for (lang, raw) in CATALOGS {
            let messages: HashMap<String, String> = serde_json::from_str(raw)
                .with_context(|| format!("Catálogo de traduções '{}' inválido", lang))?;
            catalogs.insert(lang.to_string(), messages);
        }
        Ok(Self { catalogs })
    }

    // Fallback: idioma pedido -> português -> a própria chave
    pub fn translate(&self, lang: &str, key: &str) -> String {
        self.catalogs
            .get(lang)
            .and_then(|c| c.get(key))
            .or_else(|| self.catalogs.get(DEFAULT_LANG).and_then(|c| c.get(key)))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Traduz e substitui os marcadores `{nome}` pelos argumentos.
    pub fn translate_with(&self, lang: &str, key: &str, args: &[(&str, &str)]) -> String {
        let mut message = self.translate(lang, key);
        for (name, value) in args {
            message = message.replace(&format!("{{{}}}", name), value);
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_has_the_same_keys() {
        let store = I18nStore::load().unwrap();
        let pt = &store.catalogs["pt"];
        let en = &store.catalogs["en"];
        for key in pt.keys() {
            assert!(en.contains_key(key), "chave '{}' ausente em en.json", key);
        }
        assert_eq!(pt.len(), en.len());
    }

    #[test]
    fn falls_back_to_portuguese_then_to_the_key() {
        let store = I18nStore::load().unwrap();
        assert_eq!(
            store.translate("de", "errors.method_not_allowed"),
            "Método não permitido."
        );
        assert_eq!(store.translate("en", "nao.existe"), "nao.existe");
    }

    #[test]
    fn replaces_placeholders() {
        let store = I18nStore::load().unwrap();
        let msg = store.translate_with("en", "errors.role_not_found", &[("role", "Agente")]);
        assert_eq!(msg, "Role 'Agente' not found.");
    }
}
