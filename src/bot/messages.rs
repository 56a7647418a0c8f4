// src/bot/messages.rs - Localized reply templates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ar,
    En,
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ar" | "arabic" => Ok(Language::Ar),
            "en" | "english" => Ok(Language::En),
            other => Err(format!("Unsupported language '{}', expected 'ar' or 'en'", other)),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::Ar => "ar",
            Language::En => "en",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    Welcome,
    Help,
    Status,
    Unauthorized,
    OnlyCreatorAllowed,
    NotConfigured,
    AddAdminUsage,
    RemoveAdminUsage,
    InvalidUserId,
    AdminAddedSuccess,
    AdminAddFailed,
    AdminRemovedSuccess,
    AdminNotMonitored,
    NoMonitoredAdmins,
    MonitoredAdminsHeader,
    MonitoredAdminEntry,
    ChannelAddedSuccess,
    ChannelAlreadyProtected,
    ChannelRemovedSuccess,
    AddChannelInstructions,
    LogsHeader,
    LogEntry,
    NoLogs,
    ConfigDisplay,
    ConfigUsage,
    ConfigUpdated,
    AdminBanned,
    AdminDemoted,
    BotMissingRights,
    EnforcementFailed,
    BurstWarning,
    CommandFailed,
    Enabled,
    Disabled,
    StatusOwner,
    StatusAdmin,
    StatusNone,
    StatusUnknown,
    ButtonAddChannel,
    ButtonConfirmAddChannel,
    ButtonListAdmins,
    ButtonStatus,
    ButtonHelp,
    ButtonLogs,
    ButtonConfig,
    ButtonMainMenu,
}

/// Message catalog for one language
#[derive(Debug, Clone, Copy)]
pub struct Messages {
    language: Language,
}

impl Messages {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Raw template text
    pub fn get(&self, key: MessageKey) -> &'static str {
        match self.language {
            Language::Ar => arabic(key),
            Language::En => english(key),
        }
    }

    /// Template with `{name}` placeholders substituted
    pub fn render(&self, key: MessageKey, args: &[(&str, &str)]) -> String {
        args.iter().fold(self.get(key).to_string(), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), value)
        })
    }

    pub fn on_off(&self, enabled: bool) -> &'static str {
        if enabled {
            self.get(MessageKey::Enabled)
        } else {
            self.get(MessageKey::Disabled)
        }
    }
}

fn arabic(key: MessageKey) -> &'static str {
    use MessageKey::*;

    match key {
        Welcome => "🛡️ مرحباً بك في بوت حماية القناة\n\nهذا البوت يقوم بمراقبة المشرفين ويحمي القناة من إساءة استخدام صلاحياتهم.\n\nالأوامر المتاحة:\n/help - عرض المساعدة\n/status - حالة البوت\n/logs - عرض السجلات\n/config - إعدادات البوت\n\n⚠️ تأكد من منح البوت صلاحيات الإدارة اللازمة",
        Help => "📋 أوامر البوت:\n\nالأوامر العامة:\n/start - بدء استخدام البوت\n/status - عرض حالة البوت والإحصائيات\n/logs - عرض آخر الأحداث المسجلة\n/config - عرض إعدادات البوت\n\nأوامر المالك فقط:\n/add_channel - إضافة هذه القناة للحماية\n/remove_channel - إزالة هذه القناة من الحماية\n/add_admin [رقم المشرف] - إضافة مشرف موثوق\n/remove_admin [رقم المشرف] - إزالة مشرف موثوق\n/list_admins - عرض قائمة المشرفين الموثوقين\n/config autoban on|off - الحظر التلقائي\n/config notify on|off - الإشعارات\n\n🔧 وظائف البوت:\n• مراقبة المشرفين غير الموثوقين\n• تنزيل المشرفين الذين يحظرون الأعضاء وحظرهم تلقائياً\n• تسجيل جميع الأحداث والتصرفات\n• إشعارات فورية عند حدوث انتهاكات",
        Status => "✅ حالة البوت: نشط\n\n📊 الإحصائيات:\n• القنوات المحمية: {protected_channels}\n• المشرفين الموثوقين في هذه القناة: {authorized_admins}\n• الحظر التلقائي: {auto_ban}\n• صلاحيات البوت: {bot_rights}\n• آخر حظر أو تقييد: {last_removal}\n\n🕐 آخر تحديث: {timestamp}",
        Unauthorized => "❌ غير مسموح لك باستخدام هذا الأمر",
        OnlyCreatorAllowed => "❌ هذا الأمر متاح فقط لمالك القناة",
        NotConfigured => "⚠️ هذه القناة غير مضافة للحماية. استخدم /add_channel أولاً",
        AddAdminUsage => "📝 الاستخدام: /add_admin [رقم_المشرف]\nمثال: /add_admin 123456789",
        RemoveAdminUsage => "📝 الاستخدام: /remove_admin [رقم_المشرف]\nمثال: /remove_admin 123456789",
        InvalidUserId => "❌ رقم المستخدم غير صحيح",
        AdminAddedSuccess => "✅ تم إضافة المشرف {admin_id} إلى قائمة المشرفين الموثوقين",
        AdminAddFailed => "❌ فشل في إضافة المشرف (تأكد من أنه مشرف فعلاً)",
        AdminRemovedSuccess => "✅ تم إزالة المشرف {admin_id} من قائمة المشرفين الموثوقين",
        AdminNotMonitored => "❌ هذا المشرف غير موجود في قائمة المشرفين الموثوقين",
        NoMonitoredAdmins => "📝 لا يوجد مشرفين موثوقين حالياً",
        MonitoredAdminsHeader => "👥 المشرفين الموثوقين:\n\n",
        MonitoredAdminEntry => "{index}. {name} ({admin_id})\n   👤 الحالة: {status}\n\n",
        ChannelAddedSuccess => "✅ تم إضافة هذه القناة إلى قائمة القنوات المحمية",
        ChannelAlreadyProtected => "ℹ️ هذه القناة محمية بالفعل",
        ChannelRemovedSuccess => "✅ تم إزالة هذه القناة من الحماية",
        AddChannelInstructions => "🛡️ لإضافة قناة للحماية:\n\n1. أضف البوت كمشرف في القناة\n2. امنحه صلاحيات حظر الأعضاء وإضافة المشرفين\n3. اضغط على الزر أدناه أو أرسل /add_channel داخل القناة",
        LogsHeader => "📋 آخر الأحداث المسجلة:\n\n",
        LogEntry => "🕐 {time} - {action} (المنفذ: {actor}، المستهدف: {target})\n",
        NoLogs => "لا توجد سجلات متاحة",
        ConfigDisplay => "⚙️ إعدادات البوت:\n\n🌐 اللغة: العربية\n🔄 الحظر التلقائي: {auto_ban}\n📢 الإشعارات: {notify}\n\n📁 القنوات المحمية: {protected_count}\n👥 المشرفين الموثوقين: {authorized_count}",
        ConfigUsage => "📝 الاستخدام: /config autoban on|off أو /config notify on|off",
        ConfigUpdated => "✅ تم تحديث الإعدادات: {setting} = {value}",
        AdminBanned => "⚠️ تم إزالة مشرف من القناة\n\n👤 المشرف المحظور: {admin}\n📝 السبب: حظر العضو {member}\n🕐 التوقيت: {timestamp}\n\nتم تنزيل المشرف وحظره تلقائياً لإساءة استخدام الصلاحيات",
        AdminDemoted => "⚠️ تم تنزيل مشرف\n\n👤 المشرف: {admin}\n📝 السبب: حظر العضو {member}\n🕐 التوقيت: {timestamp}\n\nتم سحب صلاحيات المشرف لإساءة استخدامها",
        BotMissingRights => "⚠️ لم يتمكن البوت من معاقبة المشرف {admin}\n\nالبوت يفتقد الصلاحيات: {missing}\nيرجى منح البوت صلاحيات حظر الأعضاء وإضافة المشرفين",
        EnforcementFailed => "❌ فشل تنفيذ الإجراء ضد المشرف {admin}: {reason}",
        BurstWarning => "⚠️ تنبيه: المشرف {admin} قام بحظر {count} عضو خلال {window} دقيقة",
        CommandFailed => "❌ حدث خطأ أثناء تنفيذ الأمر، حاول مرة أخرى",
        Enabled => "مفعل",
        Disabled => "معطل",
        StatusOwner => "منشئ القناة",
        StatusAdmin => "مشرف",
        StatusNone => "ليس مشرفاً",
        StatusUnknown => "غير معروف",
        ButtonAddChannel => "🛡️ إضافة قناة للحماية",
        ButtonConfirmAddChannel => "✅ إضافة هذه القناة",
        ButtonListAdmins => "📝 عرض المشرفين",
        ButtonStatus => "📊 حالة البوت",
        ButtonHelp => "📋 المساعدة",
        ButtonLogs => "📋 السجلات",
        ButtonConfig => "⚙️ الإعدادات",
        ButtonMainMenu => "🏠 العودة للقائمة الرئيسية",
    }
}

fn english(key: MessageKey) -> &'static str {
    use MessageKey::*;

    match key {
        Welcome => "🛡️ Welcome to the channel guard bot\n\nThis bot watches administrators and protects the channel from privilege abuse.\n\nAvailable commands:\n/help - show help\n/status - bot status\n/logs - recent events\n/config - bot settings\n\n⚠️ Make sure the bot has the admin rights it needs",
        Help => "📋 Bot commands:\n\nGeneral:\n/start - start using the bot\n/status - bot status and statistics\n/logs - recent recorded events\n/config - show settings\n\nOwner only:\n/add_channel - protect this channel\n/remove_channel - stop protecting this channel\n/add_admin [user id] - trust an admin\n/remove_admin [user id] - stop trusting an admin\n/list_admins - list trusted admins\n/config autoban on|off - automatic ban\n/config notify on|off - notifications\n\n🔧 What the bot does:\n• Watches untrusted administrators\n• Demotes and bans admins who ban regular members\n• Records every event and action\n• Notifies the channel when abuse happens",
        Status => "✅ Bot status: active\n\n📊 Statistics:\n• Protected channels: {protected_channels}\n• Trusted admins in this channel: {authorized_admins}\n• Auto ban: {auto_ban}\n• Bot rights: {bot_rights}\n• Last ban or restriction: {last_removal}\n\n🕐 Updated: {timestamp}",
        Unauthorized => "❌ You are not allowed to use this command",
        OnlyCreatorAllowed => "❌ This command is only available to the channel owner",
        NotConfigured => "⚠️ This channel is not protected yet. Use /add_channel first",
        AddAdminUsage => "📝 Usage: /add_admin [user_id]\nExample: /add_admin 123456789",
        RemoveAdminUsage => "📝 Usage: /remove_admin [user_id]\nExample: /remove_admin 123456789",
        InvalidUserId => "❌ Invalid user id",
        AdminAddedSuccess => "✅ Admin {admin_id} added to the trusted list",
        AdminAddFailed => "❌ Could not add the admin (make sure they are an administrator)",
        AdminRemovedSuccess => "✅ Admin {admin_id} removed from the trusted list",
        AdminNotMonitored => "❌ This admin is not on the trusted list",
        NoMonitoredAdmins => "📝 There are no trusted admins yet",
        MonitoredAdminsHeader => "👥 Trusted admins:\n\n",
        MonitoredAdminEntry => "{index}. {name} ({admin_id})\n   👤 Status: {status}\n\n",
        ChannelAddedSuccess => "✅ This channel is now protected",
        ChannelAlreadyProtected => "ℹ️ This channel is already protected",
        ChannelRemovedSuccess => "✅ This channel is no longer protected",
        AddChannelInstructions => "🛡️ To protect a channel:\n\n1. Add the bot as an administrator\n2. Grant it ban and add-admin rights\n3. Press the button below or send /add_channel inside the channel",
        LogsHeader => "📋 Recent events:\n\n",
        LogEntry => "🕐 {time} - {action} (actor: {actor}, target: {target})\n",
        NoLogs => "No records available",
        ConfigDisplay => "⚙️ Bot settings:\n\n🌐 Language: English\n🔄 Auto ban: {auto_ban}\n📢 Notifications: {notify}\n\n📁 Protected channels: {protected_count}\n👥 Trusted admins: {authorized_count}",
        ConfigUsage => "📝 Usage: /config autoban on|off or /config notify on|off",
        ConfigUpdated => "✅ Settings updated: {setting} = {value}",
        AdminBanned => "⚠️ An administrator was removed\n\n👤 Banned admin: {admin}\n📝 Reason: banned member {member}\n🕐 Time: {timestamp}\n\nThe admin was demoted and banned automatically for abusing their rights",
        AdminDemoted => "⚠️ An administrator was demoted\n\n👤 Admin: {admin}\n📝 Reason: banned member {member}\n🕐 Time: {timestamp}\n\nThe admin's rights were revoked for abusing them",
        BotMissingRights => "⚠️ The bot could not act against admin {admin}\n\nMissing rights: {missing}\nPlease grant the bot the ban and add-admin rights",
        EnforcementFailed => "❌ Enforcement against admin {admin} failed: {reason}",
        BurstWarning => "⚠️ Warning: admin {admin} removed {count} members within {window} minutes",
        CommandFailed => "❌ Something went wrong while running the command, please try again",
        Enabled => "on",
        Disabled => "off",
        StatusOwner => "owner",
        StatusAdmin => "admin",
        StatusNone => "not an admin",
        StatusUnknown => "unknown",
        ButtonAddChannel => "🛡️ Protect a channel",
        ButtonConfirmAddChannel => "✅ Protect this channel",
        ButtonListAdmins => "📝 Trusted admins",
        ButtonStatus => "📊 Status",
        ButtonHelp => "📋 Help",
        ButtonLogs => "📋 Logs",
        ButtonConfig => "⚙️ Settings",
        ButtonMainMenu => "🏠 Main menu",
    }
}
