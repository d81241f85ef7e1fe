//! 通知模板本地化
//!
//! 按 (通知类型, 语言) 查找模板，并对 `{{key}}` 占位符做字面替换。
//!
//! ## 使用示例
//!
//! ```ignore
//! let engine = TemplateEngine::with_defaults("en");
//!
//! let request = NotificationRequest::new(user, NotificationKind::WeatherAlert, Priority::High, title, body)
//!     .with_data("description", "भारी बारिश")
//!     .with_data("location", "मुंबई");
//!
//! let localized = engine.localize(&request, "hi");
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::models::{NotificationKind, NotificationRequest};

/// 匹配 {{variable_name}} 格式，变量名支持字母、数字、下划线
static VARIABLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("模板变量正则无效"));

/// 本地化通知模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTemplate {
    pub kind: NotificationKind,
    pub language: String,
    pub title: String,
    pub body: String,
}

/// 模板引擎
///
/// 模板在启动时注册，运行期只读
pub struct TemplateEngine {
    templates: HashMap<(NotificationKind, String), NotificationTemplate>,
    /// 默认语言的通知直接使用调用方给出的标题和正文
    default_language: String,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::with_defaults("en")
    }
}

/// 取语言标签的主子标签并转为小写，如 "hi-IN" -> "hi"
pub fn normalize_language(language: &str) -> String {
    language
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

impl TemplateEngine {
    /// 创建空的模板引擎
    pub fn new(default_language: &str) -> Self {
        Self {
            templates: HashMap::new(),
            default_language: normalize_language(default_language),
        }
    }

    /// 创建带有内置本地化模板的引擎
    pub fn with_defaults(default_language: &str) -> Self {
        let mut engine = Self::new(default_language);
        engine.register_default_templates();
        engine
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    fn register_default_templates(&mut self) {
        use NotificationKind::*;

        // 印地语
        self.register_template(
            WeatherAlert,
            "hi",
            "मौसम चेतावनी: {{alert_type}}",
            "{{location}} में {{description}}",
        );
        self.register_template(
            DelayAlert,
            "hi",
            "उड़ान {{flight_number}} में देरी",
            "आपकी उड़ान {{flight_number}} की स्थिति: {{status}}। अनुमानित देरी {{delay_minutes}} मिनट।",
        );
        self.register_template(ItineraryUpdate, "hi", "यात्रा अपडेट", "{{message}}");
        self.register_template(
            BookingConfirmation,
            "hi",
            "बुकिंग की पुष्टि हो गई",
            "आपकी {{booking_type}} बुकिंग की पुष्टि हो गई है। पुष्टि संख्या: {{confirmation_number}}",
        );
        self.register_template(EmergencyAlert, "hi", "आपातकालीन चेतावनी", "{{message}}");

        // 西班牙语
        self.register_template(
            WeatherAlert,
            "es",
            "Alerta meteorológica: {{alert_type}}",
            "{{description}} en {{location}}",
        );
        self.register_template(
            DelayAlert,
            "es",
            "Retraso del vuelo {{flight_number}}",
            "Estado de su vuelo {{flight_number}}: {{status}}. Retraso estimado: {{delay_minutes}} minutos.",
        );
        self.register_template(ItineraryUpdate, "es", "Actualización del viaje", "{{message}}");
        self.register_template(
            BookingConfirmation,
            "es",
            "Reserva confirmada",
            "Su reserva de {{booking_type}} está confirmada. Número de confirmación: {{confirmation_number}}",
        );
        self.register_template(EmergencyAlert, "es", "Alerta de emergencia", "{{message}}");

        // 法语
        self.register_template(
            WeatherAlert,
            "fr",
            "Alerte météo : {{alert_type}}",
            "{{description}} à {{location}}",
        );
        self.register_template(
            DelayAlert,
            "fr",
            "Retard du vol {{flight_number}}",
            "Statut de votre vol {{flight_number}} : {{status}}. Retard estimé : {{delay_minutes}} minutes.",
        );
        self.register_template(ItineraryUpdate, "fr", "Mise à jour du voyage", "{{message}}");
        self.register_template(
            BookingConfirmation,
            "fr",
            "Réservation confirmée",
            "Votre réservation {{booking_type}} est confirmée. Numéro de confirmation : {{confirmation_number}}",
        );
        self.register_template(EmergencyAlert, "fr", "Alerte d'urgence", "{{message}}");
    }

    /// 注册模板，同一 (类型, 语言) 重复注册时覆盖
    pub fn register_template(
        &mut self,
        kind: NotificationKind,
        language: &str,
        title: impl Into<String>,
        body: impl Into<String>,
    ) {
        let language = normalize_language(language);
        self.templates.insert(
            (kind, language.clone()),
            NotificationTemplate {
                kind,
                language,
                title: title.into(),
                body: body.into(),
            },
        );
    }

    /// 查找 (类型, 语言) 对应的模板，不存在时返回 None
    pub fn resolve(&self, kind: NotificationKind, language: &str) -> Option<&NotificationTemplate> {
        self.templates.get(&(kind, normalize_language(language)))
    }

    /// 替换模板中的 `{{key}}` 占位符
    ///
    /// 未找到的变量保留原样并记录警告日志
    pub fn render(&self, template: &str, data: &HashMap<String, String>) -> String {
        VARIABLE_REGEX
            .replace_all(template, |caps: &regex::Captures| {
                let var_name = &caps[1];
                match data.get(var_name) {
                    Some(value) => value.clone(),
                    None => {
                        warn!(variable = var_name, "模板变量未找到，保留原样");
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// 渲染模板的标题和正文
    pub fn apply(
        &self,
        template: &NotificationTemplate,
        data: &HashMap<String, String>,
    ) -> (String, String) {
        (
            self.render(&template.title, data),
            self.render(&template.body, data),
        )
    }

    /// 是否需要本地化：目标语言为空或为默认语言时不处理
    pub fn needs_localization(&self, language: &str) -> bool {
        let language = normalize_language(language);
        !language.is_empty() && language != self.default_language
    }

    /// 生成目标语言版本的请求
    ///
    /// 返回新值，原请求不变。没有对应模板时沿用原标题和正文。
    pub fn localize(&self, request: &NotificationRequest, language: &str) -> NotificationRequest {
        if !self.needs_localization(language) {
            return request.clone();
        }

        match self.resolve(request.kind, language) {
            Some(template) => {
                let (title, body) = self.apply(template, &request.data);
                debug!(
                    kind = request.kind.as_str(),
                    language = %template.language,
                    "通知已本地化"
                );
                request.localized(title, body, template.language.clone())
            }
            None => {
                debug!(
                    kind = request.kind.as_str(),
                    language = %language,
                    "无本地化模板，沿用原文"
                );
                request.clone()
            }
        }
    }
}
